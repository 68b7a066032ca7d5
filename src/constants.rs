//! Global constants shared by the quill tools

/// Columns a tab character advances the cursor by.
pub const TAB_SIZE: usize = 4;

/// Starting allocation for general-purpose byte buffers.
pub const INIT_BUF_SIZE: usize = 512;

/// Starting allocation for gap buffers (content plus gap plus sentinel).
pub const INIT_GAP_BUF_SIZE: usize = 512;

/// Block size for draining readers into an output buffer.
pub const READ_BLOCK_SIZE: usize = 8192;

pub mod m4 {
    /// Buckets in the macro and trace hash tables.
    pub const NUM_BUCKETS: usize = 1024;

    /// Macros collect any number of arguments, but only `$0` to `$9`
    /// can be referenced. `$0` is the macro name.
    pub const NUM_ARGS: usize = 10;

    /// Diversion 0 continuously flushes to the sink. Index 10 is
    /// diversion -1, which is continuously discarded.
    pub const NUM_DIVS: usize = 11;
    pub const DIV_NEG_1: usize = 10;

    pub const DEFAULT_LEFT_COMMENT: &str = "#";
    pub const DEFAULT_RIGHT_COMMENT: &str = "\n";
    pub const DEFAULT_LEFT_QUOTE: &str = "`";
    pub const DEFAULT_RIGHT_QUOTE: &str = "'";
}
