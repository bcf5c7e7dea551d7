//! Presentation hints
//!
//! Icons are owned by the UI; the tree only stores whatever hint the
//! resolver hands back when a node is created or renamed.

/// Derives an icon hint for a node
pub trait IIconResolver: Send + Sync {
    fn icon_for(&self, name: &str, is_dir: bool) -> Option<String>;
}

/// Resolver that never assigns an icon
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIcons;

impl IIconResolver for NoIcons {
    fn icon_for(&self, _name: &str, _is_dir: bool) -> Option<String> {
        None
    }
}
