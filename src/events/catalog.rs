/// Label reported for any key id outside the catalog.
pub const UNKNOWN_ACTION: &str = "UNKNOWN";

/// Highest key id the firmware assigns a pattern to.
pub const MAX_KEY_ID: u64 = 37;

/// Action labels indexed by `key_id - 1`.
const ACTIONS: [&str; MAX_KEY_ID as usize] = [
    "LEFT",
    "RIGHT",
    "BOTH",
    "LEFT RIGHT RIGHT",
    "RIGHT LEFT LEFT",
    "DOUBLE DUO",
    "LEFT LEFT RIGHT",
    "RIGHT RIGHT LEFT",
    "RIGHT LEFT",
    "LEFT RIGHT",
    "DOUBLE LEFT DOUBLE RIGHT",
    "3-LEFT 2-RIGHT",
    "R-L-R-L",
    "LEFT RIGHT LEFT",
    "RIGHT LEFT RIGHT",
    "TRIPLE LEFT",
    "TRIPLE RIGHT",
    "QUAD LEFT",
    "QUAD RIGHT",
    "LEFT BOTH LEFT",
    "RIGHT BOTH RIGHT",
    "BOTH LEFT",
    "BOTH RIGHT",
    "TRIPLE BOTH",
    "L-R-L-R",
    "DOUBLE RIGHT DOUBLE LEFT",
    "DOUBLE LEFT R-L",
    "DOUBLE RIGHT L-R",
    "R-L-R-L-R SWING",
    "TRIPLE LEFT RIGHT",
    "TRIPLE RIGHT LEFT",
    "LEFT LEFT BOTH RIGHT",
    "RIGHT RIGHT BOTH LEFT",
    "TRIPLE LEFT BOTH",
    "TRIPLE RIGHT BOTH",
    "DOUBLE LEFT",
    "DOUBLE RIGHT",
];

/// Map a key id to its action label.
pub fn action_label(key_id: u64) -> &'static str {
    match key_id {
        1..=MAX_KEY_ID => ACTIONS[(key_id - 1) as usize],
        _ => UNKNOWN_ACTION,
    }
}
