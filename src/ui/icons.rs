pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const DATABASE: &str = "🗄️";
    pub const CLOUD: &str = "☁️";
    pub const DIAGRAM: &str = "🗺️";
    pub const NEW: &str = "✨";
    pub const MOVE: &str = "➡️";
    pub const DEL: &str = "🗑️";
    pub const GEAR: &str = "⚙️";
}
