//! Server status flags.

use bitflags::bitflags;

bitflags! {
    /// Status flags carried in the greeting and in OK packets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ServerStatus: u16 {
        /// A transaction is active.
        const IN_TRANS = 0x0001;
        /// Autocommit mode is enabled.
        const AUTOCOMMIT = 0x0002;
        /// More result sets follow.
        const MORE_RESULTS_EXISTS = 0x0008;
        /// Query did not use a good index.
        const NO_GOOD_INDEX_USED = 0x0010;
        /// Query did not use an index.
        const NO_INDEX_USED = 0x0020;
        /// A read-only cursor exists.
        const CURSOR_EXISTS = 0x0040;
        /// The last row of a cursor was sent.
        const LAST_ROW_SENT = 0x0080;
        /// A database was dropped.
        const DB_DROPPED = 0x0100;
        /// Backslash escapes are disabled.
        const NO_BACKSLASH_ESCAPES = 0x0200;
        /// Metadata changed for a prepared statement.
        const METADATA_CHANGED = 0x0400;
        /// Query was logged as slow.
        const QUERY_WAS_SLOW = 0x0800;
        /// Statement has output parameters.
        const PS_OUT_PARAMS = 0x1000;
        /// Read-only transaction is active.
        const IN_TRANS_READONLY = 0x2000;
        /// Session state changed.
        const SESSION_STATE_CHANGED = 0x4000;
    }
}
