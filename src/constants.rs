/// Magic bytes opening every named-array container file.
pub const CONTAINER_MAGIC: &[u8; 8] = b"GRIDARR\0";

/// Type code of the first tracer fluid field; subsequent fields take
/// consecutive codes.
pub const TRACER_TYPE_BASE: u32 = 106;

/// The solver supports at most this many tracer fluid fields.
pub const MAX_TRACER_FIELDS: usize = 8;

/// Default value for tracer cells outside every seeded region. Matches the
/// solver's internal tiny_number.
pub const TINY_NUMBER: f64 = 1.0e-20;

/// Suffix of the guarded scratch file a rewrite is staged into.
pub const SCRATCH_SUFFIX: &str = "new";

/// Suffix of the backup copy taken before any file is modified.
pub const BACKUP_SUFFIX: &str = "orig";
