use thiserror::Error;

/// Errors returned by the storage engine. A caller would usually only handle `NotFound`
/// (nothing scheduled at that time) and `OutOfSpace`; the remaining variants are static
/// configuration problems or device failures.
#[derive(Error, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// Operation issued before `init` or after `close`
    #[error("storage not initialized")]
    NotInitialized,

    /// `init` called twice without `drop`
    #[error("storage already initialized")]
    AlreadyInitialized,

    /// The flash page size must equal the flight plan record size and divide the section size
    #[error("invalid flash geometry")]
    InvalidGeometry,

    /// The configured tables do not fit into the flash or the FRAM
    #[error("invalid storage layout")]
    InvalidLayout,

    /// The internal error value is returned from the provided flash device
    #[error("internal flash error")]
    FlashError,

    /// The internal error value is returned from the provided FRAM device
    #[error("internal fram error")]
    FramError,

    /// Lookup miss. This is the normal result when nothing is scheduled.
    #[error("not found")]
    NotFound,

    /// No free flight plan slot within the configured capacity, or the active section
    /// is still full after compaction.
    #[error("out of space")]
    OutOfSpace,

    /// The access would straddle a flash page (or a section for erases)
    #[error("alignment violation")]
    AlignmentViolation,

    /// Address computation left the allocated range
    #[error("address out of bounds")]
    OutOfBounds,

    /// Status variable or flight plan index outside the configured table
    #[error("index out of bounds")]
    IndexOutOfBounds,

    /// The compaction scratch buffer could not be allocated. Nothing was erased.
    #[error("allocation failure")]
    AllocationFailure,

    /// Negative timestamps are reserved, -1 marks a free slot
    #[error("invalid timestamp")]
    InvalidTimestamp,

    /// Another live entry already uses this timestamp
    #[error("duplicate timestamp")]
    DuplicateTimestamp,

    /// A sample has to fit into a single flash page
    #[error("sample larger than a flash page")]
    SampleTooLarge,

    /// The sample buffer does not match the payload record size
    #[error("sample size mismatch")]
    SampleSizeMismatch,

    /// No schema registered for the payload id
    #[error("unknown payload")]
    UnknownPayload,

    /// The persisted TLB does not describe a consistent flight plan. Re-initialize with `drop`.
    #[error("corrupted tlb backup")]
    CorruptedBackup,

    /// A compaction was interrupted after its erase. Only `reset` is accepted until then.
    #[error("flight plan faulted")]
    Faulted,
}
