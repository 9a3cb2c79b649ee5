//! FDO message classification.
//!
//! Requests carry the message type in the URL (`/fdo/{version}/msg/{type}`),
//! responses in the `Message-Type` header. Both functions are pure: the same
//! request or response always classifies the same way.

use axum::http::HeaderMap;

/// Protocol namespace segment of FDO message URLs.
pub const PROTOCOL_NAMESPACE: &str = "fdo";

/// Response header carrying the numeric message type.
pub const MESSAGE_TYPE_HEADER: &str = "message-type";

/// Numeric FDO message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageType(pub u16);

impl MessageType {
    pub const DI_APP_START: MessageType = MessageType(10);
    pub const DI_SET_CREDENTIALS: MessageType = MessageType(11);
    pub const DI_SET_HMAC: MessageType = MessageType(12);
    pub const DI_DONE: MessageType = MessageType(13);
    pub const TO2_HELLO_DEVICE: MessageType = MessageType(60);
    pub const TO2_DONE: MessageType = MessageType(70);
    pub const TO2_DONE2: MessageType = MessageType(71);

    /// Protocol step name, for the types this proxy knows about.
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::DI_APP_START => "DI.AppStart",
            Self::DI_SET_CREDENTIALS => "DI.SetCredentials",
            Self::DI_SET_HMAC => "DI.SetHMAC",
            Self::DI_DONE => "DI.Done",
            Self::TO2_HELLO_DEVICE => "TO2.HelloDevice",
            Self::TO2_DONE => "TO2.Done",
            Self::TO2_DONE2 => "TO2.Done2",
            _ => return None,
        })
    }

    fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        raw.parse().ok().map(MessageType)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", self.0, name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Message type of a request path shaped `/fdo/{version}/msg/{type}`.
pub fn request_message_type(path: &str) -> Option<MessageType> {
    let mut segments = path.strip_prefix('/')?.split('/');
    let namespace = segments.next()?;
    let version = segments.next()?;
    let marker = segments.next()?;
    let msg_type = segments.next()?;
    if segments.next().is_some() {
        return None;
    }
    if namespace != PROTOCOL_NAMESPACE || version.is_empty() || marker != "msg" {
        return None;
    }
    MessageType::parse(msg_type)
}

/// Message type announced by the `Message-Type` response header.
pub fn response_message_type(headers: &HeaderMap) -> Option<MessageType> {
    let value = headers.get(MESSAGE_TYPE_HEADER)?.to_str().ok()?;
    MessageType::parse(value.trim())
}
