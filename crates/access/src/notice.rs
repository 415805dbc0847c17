use serde::Serialize;

/// Non-blocking message a surface may show instead of (or next to) content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    /// The principal's role does not allow this.
    InsufficientPermission,
    /// Roles could not be loaded; the principal is running with viewer
    /// permissions until a refresh succeeds.
    LimitedFunctionality,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::InsufficientPermission => "You do not have permission to access this.",
            Notice::LimitedFunctionality => {
                "Your permissions could not be loaded. Some features are unavailable until you retry."
            }
        }
    }
}

impl core::fmt::Display for Notice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}
