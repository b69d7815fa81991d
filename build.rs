use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    application: Application,
    audio: Audio,
    conversation: Conversation,
    network: Network,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Audio {
    capture_device: String,
    playback_device: String,
    sample_rate: u32,
    channels: u32,
    block_size: usize,
}

#[derive(Deserialize)]
struct Conversation {
    backend: String,
    user_id: String,
    queue_capacity: usize,
    capture_join_timeout_ms: u64,
}

#[derive(Deserialize)]
struct Network {
    ws_url: String,
    ws_token: String,
    connect_retries: u32,
}

// 在编译时读取 config.toml 并设置环境变量
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    // 音频配置
    println!("cargo:rustc-env=AUDIO_CAPTURE_DEVICE={}", config.audio.capture_device);
    println!("cargo:rustc-env=AUDIO_PLAYBACK_DEVICE={}", config.audio.playback_device);
    println!("cargo:rustc-env=AUDIO_SAMPLE_RATE={}", config.audio.sample_rate);
    println!("cargo:rustc-env=AUDIO_CHANNELS={}", config.audio.channels);
    println!("cargo:rustc-env=AUDIO_BLOCK_SIZE={}", config.audio.block_size);

    // 会话配置
    println!("cargo:rustc-env=CONVERSATION_BACKEND={}", config.conversation.backend);
    println!("cargo:rustc-env=CONVERSATION_USER_ID={}", config.conversation.user_id);
    println!("cargo:rustc-env=CONVERSATION_QUEUE_CAPACITY={}", config.conversation.queue_capacity);
    println!(
        "cargo:rustc-env=CONVERSATION_CAPTURE_JOIN_TIMEOUT_MS={}",
        config.conversation.capture_join_timeout_ms
    );

    // 网络配置
    println!("cargo:rustc-env=WS_URL={}", config.network.ws_url);
    println!("cargo:rustc-env=WS_TOKEN={}", config.network.ws_token);
    println!("cargo:rustc-env=WS_CONNECT_RETRIES={}", config.network.connect_retries);
}
