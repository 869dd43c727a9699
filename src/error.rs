//! Error types returned by the runtime.
//!
//! Registration problems are reported once, when the world is built.
//! Steady-state problems (unknown ids, malformed inbound diffs, undecodable bytes)
//! are reported per call and leave the world usable.

use itertools::Itertools;

/// A type-erased error produced outside this crate, e.g. by a foreign module binder.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The top-level error type of the runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The world could not be built from the given types.
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    /// A component name that was never registered.
    #[error("unknown component `{0}`")]
    UnknownComponent(String),
    /// An entity id that is not live.
    #[error("entity {0} does not exist")]
    NoSuchEntity(u32),
    /// An explicit id that is already taken by a live entity.
    #[error("entity {0} already exists")]
    EntityExists(u32),
    /// The entity exists but the component is not attached to it.
    #[error("entity {entity} has no `{component}`")]
    NotAttached {
        /// The entity accessed.
        entity:    u32,
        /// The component requested.
        component: String,
    },
    /// The id `0` is reserved.
    #[error("entity id 0 is reserved")]
    ReservedId,
    /// Every automatic id up to `u32::MAX` has been issued or reserved.
    #[error("no entity ids are left")]
    IdsExhausted,
    /// A field write or an inbound diff did not match the declared layout.
    #[error("cannot patch `{component}` of entity {entity}: {source}")]
    Patch {
        /// The entity being patched.
        entity:    u32,
        /// The component being patched.
        component: String,
        /// The validation failure.
        #[source]
        source:    PatchError,
    },
    /// A foreign module could not be bound to a system.
    #[error("{system}: {source}")]
    Bind {
        /// The name of the system that failed to bind its module.
        system: String,
        /// The failure reported by the system.
        #[source]
        source: BoxError,
    },
    /// Wire data could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Fatal problems found while registering component and system types.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// A field name collides with a name used by the runtime.
    #[error("field `{field}` of `{owner}` uses a reserved name")]
    ReservedName {
        /// The declaring component or object.
        owner: String,
        /// The offending field.
        field: String,
    },
    /// Two fields of the same schema share a name.
    #[error("field `{field}` of `{owner}` is declared twice")]
    DuplicateField {
        /// The declaring component or object.
        owner: String,
        /// The duplicated field.
        field: String,
    },
    /// The default value of a field does not match its kind.
    #[error("default value of `{owner}.{field}` is invalid: {source}")]
    InvalidDefault {
        /// The declaring component or object.
        owner:  String,
        /// The offending field.
        field:  String,
        /// Why the value was rejected.
        #[source]
        source: PatchError,
    },
    /// Two component types or two systems share a name.
    #[error("`{0}` is registered twice")]
    Duplicate(String),
    /// A component dependency or a system ordering hint names nothing registered.
    #[error("`{owner}` refers to unknown `{target}`")]
    UnknownReference {
        /// The declaring component or system.
        owner:  String,
        /// The name that could not be resolved.
        target: String,
    },
    /// The declared dependencies contain a cycle.
    #[error(transparent)]
    Cycle(#[from] CycleError),
}

/// A dependency cycle, listed from the first repeated vertex back to itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cyclic dependency: {}", .path.iter().join(" -> "))]
pub struct CycleError {
    /// The vertices on the cycle; the first vertex is repeated at the end.
    pub path: Vec<String>,
}

/// A value that does not fit the declared field layout.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatchError {
    /// The field is not declared in the schema.
    #[error("unknown field `{0}`")]
    UnknownField(String),
    /// The value variant does not match the field kind.
    #[error("expected {expected}, got {found}")]
    Mismatch {
        /// The kind the field was declared with.
        expected: &'static str,
        /// The variant that was supplied.
        found:    &'static str,
    },
    /// An integer that does not fit the declared width.
    #[error("{value} is out of range for {kind}")]
    OutOfRange {
        /// The supplied integer.
        value: i64,
        /// The declared scalar kind.
        kind:  &'static str,
    },
    /// An array index above the supported maximum.
    #[error("array index {0} is too large")]
    IndexTooLarge(u64),
    /// A nested handle was requested for a missing array index or map key.
    #[error("no element at `{0}`")]
    NoElement(String),
}

/// Malformed wire data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The input ended before the value was complete.
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),
    /// A varint used more than 10 bytes or overflowed 64 bits.
    #[error("varint overflow at byte {0}")]
    VarintOverflow(usize),
    /// A string was not valid UTF-8.
    #[error("invalid UTF-8 in string at byte {0}")]
    InvalidUtf8(usize),
    /// A boolean byte other than 0 or 1.
    #[error("invalid boolean byte {byte} at {offset}")]
    InvalidBool {
        /// The byte read.
        byte:   u8,
        /// The position of the byte.
        offset: usize,
    },
    /// A decoded length or id does not fit in memory or in the id space.
    #[error("value {0} is out of range")]
    OutOfRange(u64),
    /// Bytes remained after the top-level value.
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
    /// A value given to the encoder does not match the schema.
    #[error("cannot encode {found} as {expected}")]
    Mismatch {
        /// The kind declared by the schema.
        expected: &'static str,
        /// The variant that was supplied.
        found:    &'static str,
    },
    /// A component name given to the encoder is not registered.
    #[error("unknown component `{0}`")]
    UnknownComponent(String),
    /// A field name given to the encoder is not in the schema.
    #[error("unknown field `{0}`")]
    UnknownField(String),
}
