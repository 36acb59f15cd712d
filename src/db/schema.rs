//! Database schema definitions
//!
//! Sensors own these tables; the service only reads them. Creating them
//! when absent lets a fresh database file start up empty.

// Hourly counter history, one row per store per reading
pub const CREATE_STORE_PC_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS store_pc (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    storeID TEXT NOT NULL,
    date TEXT NOT NULL,              -- 'YYYY-MM-DD HH:MM:SS'
    type TEXT NOT NULL DEFAULT 'Hour',
    hr_enter_count INTEGER,
    hr_exit_count INTEGER,
    today_enter_count INTEGER,
    today_exit_count INTEGER,
    total_enter_count INTEGER,
    total_exit_count INTEGER,
    geo_loc TEXT,                    -- 'lat,lng'
    location TEXT
)
"#;

// Latest snapshot per store
pub const CREATE_LIVE_PC_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS live_pc (
    storeID TEXT PRIMARY KEY,
    date TEXT NOT NULL,
    hr_enter_count INTEGER,
    hr_exit_count INTEGER,
    today_enter_count INTEGER,
    today_exit_count INTEGER,
    total_enter_count INTEGER,
    total_exit_count INTEGER
)
"#;

// For every per-store windowed query
pub const CREATE_INDEX_STORE_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_store_pc_store_date ON store_pc(storeID, date)";

// For cross-store reports bounded by date
pub const CREATE_INDEX_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_store_pc_date ON store_pc(date)";
