use super::error::ControlError;

/// Magic number of every control command.
pub const IOC_MAGIC: u32 = 0x81;

/// Highest command number in use.
pub const IOC_MAXNR: u32 = 12;

const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;

const IOC_NONE: u32 = 0;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const ARG_SIZE: u32 = std::mem::size_of::<i32>() as u32;

const fn ioc(dir: u32, nr: u32, size: u32) -> u32 {
    (dir << IOC_DIRSHIFT) | (IOC_MAGIC << IOC_TYPESHIFT) | (nr << IOC_NRSHIFT) | (size << IOC_SIZESHIFT)
}

/// The default a command acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    /// Block order.
    Order,
    /// Quantum-set capacity.
    Qset,
}

impl Parameter {
    const fn base(self) -> u32 {
        match self {
            Parameter::Order => 0,
            Parameter::Qset => 6,
        }
    }
}

/// A control operation on the shared defaults.
///
/// Set, Get and Exchange move the value through a caller cell. Tell and
/// Shift take it by value, Query returns it. Exchange and Shift hand back the
/// previous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    /// Restore the built-in order and capacity.
    Reset,
    Set(Parameter),
    Tell(Parameter),
    Get(Parameter),
    Query(Parameter),
    Exchange(Parameter),
    Shift(Parameter),
}

impl ControlCommand {
    pub const ALL: [ControlCommand; 13] = [
        ControlCommand::Reset,
        ControlCommand::Set(Parameter::Order),
        ControlCommand::Tell(Parameter::Order),
        ControlCommand::Get(Parameter::Order),
        ControlCommand::Query(Parameter::Order),
        ControlCommand::Exchange(Parameter::Order),
        ControlCommand::Shift(Parameter::Order),
        ControlCommand::Set(Parameter::Qset),
        ControlCommand::Tell(Parameter::Qset),
        ControlCommand::Get(Parameter::Qset),
        ControlCommand::Query(Parameter::Qset),
        ControlCommand::Exchange(Parameter::Qset),
        ControlCommand::Shift(Parameter::Qset),
    ];

    /// Raw command code.
    pub const fn code(self) -> u32 {
        match self {
            ControlCommand::Reset => ioc(IOC_NONE, 0, 0),
            ControlCommand::Set(p) => ioc(IOC_WRITE, p.base() + 1, ARG_SIZE),
            ControlCommand::Tell(p) => ioc(IOC_NONE, p.base() + 2, 0),
            ControlCommand::Get(p) => ioc(IOC_READ, p.base() + 3, ARG_SIZE),
            ControlCommand::Query(p) => ioc(IOC_NONE, p.base() + 4, 0),
            ControlCommand::Exchange(p) => ioc(IOC_READ | IOC_WRITE, p.base() + 5, ARG_SIZE),
            ControlCommand::Shift(p) => ioc(IOC_NONE, p.base() + 6, 0),
        }
    }

    pub fn decode(code: u32) -> Result<Self, ControlError> {
        let magic = (code >> IOC_TYPESHIFT) & ((1 << IOC_TYPEBITS) - 1);
        let nr = (code >> IOC_NRSHIFT) & ((1 << IOC_NRBITS) - 1);
        if magic != IOC_MAGIC || nr > IOC_MAXNR {
            return Err(ControlError::NotSupported(code));
        }
        Self::ALL
            .into_iter()
            .find(|command| command.code() == code)
            .ok_or(ControlError::NotSupported(code))
    }

    /// Whether the command moves its value through a caller cell.
    pub fn uses_cell(self) -> bool {
        matches!(
            self,
            ControlCommand::Set(_) | ControlCommand::Get(_) | ControlCommand::Exchange(_)
        )
    }
}
