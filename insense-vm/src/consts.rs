//! VM-wide constants.

/// Prefix of on-disk component files: `Insense_<ComponentName>.isc`.
pub const COMPONENT_FILE_PREFIX: &str = "Insense_";

/// Suffix of on-disk component files.
pub const COMPONENT_FILE_SUFFIX: &str = ".isc";

/// Name of the entry component.
pub const ENTRY_COMPONENT: &str = "Main";

/// Scope binding holding the stream offset a `RETURN` restores.
pub const RETURN_ADDRESS: &str = "_returnAddress";

/// Scope binding holding the suspended stream a `RETURN` switches back to
/// after a global-procedure body finishes.
pub const RETURN_SOURCE: &str = "_returnSource";

/// Process exit code for a successful run.
pub const EXITCODE_SUCCESS: i32 = 0;

/// Process exit code for malformed command-line arguments.
pub const EXITCODE_INVALID_ARGUMENTS: i32 = -1;

/// Process exit code for an unknown log level argument.
pub const EXITCODE_UNKNOWN_LOG_LEVEL: i32 = -2;
