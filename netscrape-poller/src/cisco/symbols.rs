//! Closed tables mapping NX-OS state words to numeric codes.

/// Operational or administrative interface state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceState {
    Down = 0,
    Up = 1,
}

impl InterfaceState {
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "down" => Some(Self::Down),
            "up" => Some(Self::Up),
            _ => None,
        }
    }

    pub fn code(word: &str) -> Option<i64> {
        Self::parse(word).map(|s| s as i64)
    }
}

/// Switch port mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortMode {
    Access = 0,
    Trunk = 1,
}

impl PortMode {
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "access" => Some(Self::Access),
            "trunk" => Some(Self::Trunk),
            _ => None,
        }
    }

    pub fn code(word: &str) -> Option<i64> {
        Self::parse(word).map(|m| m as i64)
    }
}

/// BGP finite state machine state of a neighbor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BgpState {
    Idle = 0,
    Connect = 1,
    Active = 2,
    OpenSent = 3,
    OpenConfirm = 4,
    Established = 5,
}

impl BgpState {
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "connect" => Some(Self::Connect),
            "active" => Some(Self::Active),
            "opensent" => Some(Self::OpenSent),
            "openconfirm" => Some(Self::OpenConfirm),
            "established" => Some(Self::Established),
            _ => None,
        }
    }

    pub fn code(word: &str) -> Option<i64> {
        Self::parse(word).map(|s| s as i64)
    }
}
