//! JSON messages spoken by the WebSocket backend.
//!
//! Audio never travels as JSON: captured chunks go out as binary frames and
//! binary frames from the server are PCM to play.

use serde::{Deserialize, Serialize};

use crate::audio::AudioFormat;
use crate::content::ContentUnit;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub text: Option<String>,
    pub state: Option<String>,
    pub session_id: Option<String>,
}

impl ServerMessage {
    /// Messages with text become a one-part text unit; the rest are signalling.
    pub fn into_unit(self) -> Option<ContentUnit> {
        self.text.map(ContentUnit::text)
    }
}

#[derive(Serialize, Debug)]
pub struct AudioParams {
    pub format: &'static str,
    pub sample_rate: u32,
    pub channels: u32,
}

// Hello Message，用于初始化连接
#[derive(Serialize, Debug)]
pub struct HelloMessage<'a> {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub version: u8,
    pub transport: &'static str,
    pub session_id: &'a str,
    pub user_id: &'a str,
    pub audio_params: AudioParams,
}

impl<'a> HelloMessage<'a> {
    pub fn new(session_id: &'a str, user_id: &'a str, format: &AudioFormat) -> Self {
        Self {
            msg_type: "hello",
            version: 1,
            transport: "websocket",
            session_id,
            user_id,
            audio_params: AudioParams {
                format: "pcm",
                sample_rate: format.sample_rate,
                channels: format.channels,
            },
        }
    }
}
