use super::Constant;

#[derive(Debug)]
pub enum Error {
    /// The constant would not fit in the 16-bit index space of the pool
    ConstantPoolOverflow { constant: Constant, offset: usize },

    /// The pool count written into the header does not match the entries that were emitted
    ///
    /// This always indicates a bug: the analytic count and the emitting code have drifted apart.
    ConstantPoolCountMismatch { expected: u16, actual: u16 },

    /// The analytic constant pool count does not even fit in the `u16` header field
    ConstantPoolTooLarge(usize),

    /// A constant refers to an index that has not been assigned (or to the invalid index 0)
    InvalidConstantReference { index: u16, next_index: u16 },

    /// A `CONSTANT_Utf8_info` can hold at most 65535 bytes (in modified UTF-8)
    Utf8TooLong { length: usize },

    /// Method code is limited to 65535 bytes
    MethodCodeOverflow(usize),

    /// Operand stack depth does not fit in `max_stack`
    MethodCodeMaxStackOverflow(usize),

    /// The instruction's effect on the operand stack is unknown without more context (eg. an
    /// invocation pushed without its method descriptor)
    UnknownStackEffect { offset: usize },

    /// Operand stack depth went negative (indicates a bug in the emitter)
    StackUnderflow { offset: usize },

    /// Jump target is not reachable with a 16-bit relative offset
    JumpOverflow { from: usize, to: usize },

    /// A label was jumped to but never placed
    UnplacedLabel(usize),

    /// A label was placed twice
    DuplicateLabel(usize),

    /// Tried to patch bytes that have not been written yet
    PatchOutOfBounds { offset: usize, len: usize },

    IoError(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}
