//! MCP method name constants and the closed set of methods the relay serves.
//!
//! Each constant is the exact string sent over the wire as the `method`
//! field of a JSON-RPC message.

/// All MCP method names handled by the relay.
pub struct Methods;

impl Methods {
    // ── Lifecycle ───────────────────────────────────────────────────────
    pub const INITIALIZE: &str = "initialize";
    pub const NOTIFICATIONS_INITIALIZED: &str = "notifications/initialized";
    pub const PING: &str = "ping";

    // ── Tools ───────────────────────────────────────────────────────────
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
}

/// A method the dispatcher knows how to handle.
///
/// Dispatch matches on this enum, so adding a variant forces every
/// handler table to cover it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Initialize,
    Initialized,
    Ping,
    ToolsList,
    ToolsCall,
}

impl Method {
    pub const ALL: [Method; 5] = [
        Method::Initialize,
        Method::Initialized,
        Method::Ping,
        Method::ToolsList,
        Method::ToolsCall,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            Methods::INITIALIZE => Some(Self::Initialize),
            Methods::NOTIFICATIONS_INITIALIZED => Some(Self::Initialized),
            Methods::PING => Some(Self::Ping),
            Methods::TOOLS_LIST => Some(Self::ToolsList),
            Methods::TOOLS_CALL => Some(Self::ToolsCall),
            _ => None,
        }
    }

    pub fn name(&self) -> MethodName {
        match self {
            Self::Initialize => Methods::INITIALIZE,
            Self::Initialized => Methods::NOTIFICATIONS_INITIALIZED,
            Self::Ping => Methods::PING,
            Self::ToolsList => Methods::TOOLS_LIST,
            Self::ToolsCall => Methods::TOOLS_CALL,
        }
    }

    /// Whether this method requires an initialized session on a stream.
    pub fn requires_initialized(&self) -> bool {
        matches!(self, Self::ToolsList | Self::ToolsCall)
    }
}

/// Returns true if the given string is a method the relay serves.
pub fn is_known_method(method: &str) -> bool {
    Method::from_name(method).is_some()
}

/// The method name is always a `&str` at the protocol level.
pub type MethodName = &'static str;
