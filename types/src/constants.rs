/// Number of distinct cards a player can choose from
pub const CARD_COUNT: u16 = 200;

/// Cards are square grids of this width
pub const GRID: usize = 5;

/// Numbers drawn per session (1..=75)
pub const BALLS: u8 = 75;

/// Numbers per column band (B=1-15, I=16-30, ...)
pub const BAND_WIDTH: u8 = 15;

/// Offset added per column to the card seed
pub const COLUMN_SEED_STRIDE: u32 = 1000;

/// Row and column of the free cell
pub const FREE_CELL: usize = 2;

/// Calls exposed as "recent" in the state view
pub const RECENT_CALLS: usize = 5;
