use std::str::FromStr;
use std::time::Duration;

use crate::audio::AudioFormat;

/// Which conversational backend the binary talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Remote backend reached through [`NetLink`](crate::backend::NetLink).
    WebSocket,
    /// In-process loopback, useful for checking devices without a server.
    Echo,
}

impl FromStr for BackendKind {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "websocket" | "ws" => Ok(Self::WebSocket),
            "echo" => Ok(Self::Echo),
            _ => Err("Unknown CONVERSATION_BACKEND, expected \"websocket\" or \"echo\""),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: &'static str,
    pub app_version: &'static str,

    // 音频设备配置，采集和播放使用同一格式
    pub capture_device: &'static str,
    pub playback_device: &'static str,
    pub sample_rate: u32,
    pub channels: u32,
    pub block_size: usize,

    // 会话配置
    pub backend: BackendKind,
    pub user_id: &'static str,
    pub queue_capacity: usize,
    pub capture_join_timeout_ms: u64,

    // 网络配置
    pub ws_url: &'static str,
    pub ws_token: &'static str,
    pub connect_retries: u32,
}

impl Config {
    /// 从编译时设置的环境变量创建配置
    /// 所有参数都在编译时从 config.toml 中读取
    pub fn new() -> Result<Self, &'static str> {
        let config = Self {
            app_name: env!("APP_NAME"),
            app_version: env!("APP_VERSION"),

            capture_device: env!("AUDIO_CAPTURE_DEVICE"),
            playback_device: env!("AUDIO_PLAYBACK_DEVICE"),
            sample_rate: env!("AUDIO_SAMPLE_RATE").parse()
                .map_err(|_| "Failed to parse AUDIO_SAMPLE_RATE")?,
            channels: env!("AUDIO_CHANNELS").parse()
                .map_err(|_| "Failed to parse AUDIO_CHANNELS")?,
            block_size: env!("AUDIO_BLOCK_SIZE").parse()
                .map_err(|_| "Failed to parse AUDIO_BLOCK_SIZE")?,

            backend: env!("CONVERSATION_BACKEND").parse()?,
            user_id: env!("CONVERSATION_USER_ID"),
            queue_capacity: env!("CONVERSATION_QUEUE_CAPACITY").parse()
                .map_err(|_| "Failed to parse CONVERSATION_QUEUE_CAPACITY")?,
            capture_join_timeout_ms: env!("CONVERSATION_CAPTURE_JOIN_TIMEOUT_MS").parse()
                .map_err(|_| "Failed to parse CONVERSATION_CAPTURE_JOIN_TIMEOUT_MS")?,

            ws_url: env!("WS_URL"),
            ws_token: env!("WS_TOKEN"),
            connect_retries: env!("WS_CONNECT_RETRIES").parse()
                .map_err(|_| "Failed to parse WS_CONNECT_RETRIES")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.block_size < self.audio_format().frame_bytes() {
            return Err("AUDIO_BLOCK_SIZE must hold at least one frame");
        }
        if self.queue_capacity == 0 {
            return Err("CONVERSATION_QUEUE_CAPACITY must be greater than zero");
        }
        Ok(())
    }

    /// The wire format shared by capture and playback.
    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.channels)
    }

    pub fn capture_join_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_join_timeout_ms)
    }
}
