//! Out-of-band control of the geometry defaults.
//!
//! The [`ControlPlane`] reads and changes the shared [`Defaults`] that
//! devices adopt when they are created and whenever they are trimmed. It
//! never touches a device directly: a running device keeps its geometry until
//! its next trim.
//!
//! Commands come either typed ([`ControlPlane::execute`]) or as raw
//! ioctl-style codes ([`ControlPlane::ioctl`]) built from magic `0x81` and
//! command numbers 0 through 12.
//!
//! # Examples
//!
//! ```
//! use quantadev::control::{ControlArg, ControlCommand, ControlPlane, Parameter};
//! use quantadev::{Defaults, Geometry};
//!
//! let plane = ControlPlane::new(Defaults::new(Geometry::default()).unwrap());
//!
//! // Shift: install by value, get the previous value back.
//! let previous = plane
//!     .execute(ControlCommand::Shift(Parameter::Qset), ControlArg::Value(64))
//!     .unwrap();
//! assert_eq!(previous, 500);
//!
//! // Get: the value lands in a caller cell.
//! let mut cell = 0i32;
//! let code = ControlCommand::Get(Parameter::Qset).code();
//! plane.ioctl(code, ControlArg::Cell(&mut cell)).unwrap();
//! assert_eq!(cell, 64);
//! ```

mod command;
mod error;

pub use command::{ControlCommand, Parameter, IOC_MAGIC, IOC_MAXNR};
pub use error::ControlError;

use std::sync::Arc;

use crate::config::Defaults;
use crate::device::BufferFault;

/// A caller-owned integer a command reads from or writes to.
pub trait UserCell {
    fn get(&self) -> Result<i32, BufferFault>;
    fn put(&mut self, value: i32) -> Result<(), BufferFault>;
}

impl UserCell for i32 {
    fn get(&self) -> Result<i32, BufferFault> {
        Ok(*self)
    }

    fn put(&mut self, value: i32) -> Result<(), BufferFault> {
        *self = value;
        Ok(())
    }
}

/// The argument passed along with a command.
pub enum ControlArg<'a> {
    None,
    Value(u64),
    Cell(&'a mut dyn UserCell),
}

impl std::fmt::Debug for ControlArg<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlArg::None => f.write_str("None"),
            ControlArg::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ControlArg::Cell(_) => f.write_str("Cell(..)"),
        }
    }
}

pub struct ControlPlane {
    defaults: Arc<Defaults>,
}

impl ControlPlane {
    pub fn new(defaults: Arc<Defaults>) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &Arc<Defaults> {
        &self.defaults
    }

    /// Decodes a raw command code and executes it.
    pub fn ioctl(&self, code: u32, arg: ControlArg<'_>) -> Result<i64, ControlError> {
        let command = ControlCommand::decode(code)?;
        self.execute(command, arg)
    }

    /// Executes a command.
    ///
    /// Returns the queried value for Query, the previous value for Shift and
    /// 0 otherwise.
    pub fn execute(&self, command: ControlCommand, arg: ControlArg<'_>) -> Result<i64, ControlError> {
        tracing::trace!("Control command {:?} with {:?}", command, arg);

        match (command, arg) {
            (ControlCommand::Reset, _) => {
                self.defaults.reset();
                Ok(0)
            }
            (ControlCommand::Set(param), ControlArg::Cell(cell)) => {
                let value = cell.get()?;
                self.store(param, to_value(i64::from(value))?)?;
                Ok(0)
            }
            (ControlCommand::Tell(param), ControlArg::Value(value)) => {
                self.store(param, to_value(value)?)?;
                Ok(0)
            }
            (ControlCommand::Get(param), ControlArg::Cell(cell)) => {
                cell.put(to_cell(self.load(param))?)?;
                Ok(0)
            }
            (ControlCommand::Query(param), _) => Ok(self.load(param) as i64),
            (ControlCommand::Exchange(param), ControlArg::Cell(cell)) => {
                let value = to_value(i64::from(cell.get()?))?;
                let previous = self.swap(param, value)?;
                cell.put(to_cell(previous)?)?;
                Ok(0)
            }
            (ControlCommand::Shift(param), ControlArg::Value(value)) => {
                let previous = self.swap(param, to_value(value)?)?;
                Ok(previous as i64)
            }
            (command, _) if command.uses_cell() => Err(ControlError::FaultyBuffer),
            (command, arg) => Err(ControlError::InvalidArgument(format!(
                "{command:?} does not take {arg:?}"
            ))),
        }
    }

    fn load(&self, param: Parameter) -> usize {
        match param {
            Parameter::Order => self.defaults.order() as usize,
            Parameter::Qset => self.defaults.qset(),
        }
    }

    fn store(&self, param: Parameter, value: usize) -> Result<(), ControlError> {
        match param {
            Parameter::Order => self.defaults.set_order(to_order(value)?)?,
            Parameter::Qset => self.defaults.set_qset(value)?,
        }
        Ok(())
    }

    fn swap(&self, param: Parameter, value: usize) -> Result<usize, ControlError> {
        Ok(match param {
            Parameter::Order => self.defaults.swap_order(to_order(value)?)? as usize,
            Parameter::Qset => self.defaults.swap_qset(value)?,
        })
    }
}

impl std::fmt::Debug for ControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlane")
            .field("defaults", &self.defaults)
            .finish()
    }
}

fn to_value<T>(value: T) -> Result<usize, ControlError>
where
    T: Copy + std::fmt::Display + TryInto<usize>,
{
    value
        .try_into()
        .map_err(|_| ControlError::InvalidArgument(format!("value {value} out of range")))
}

fn to_order(value: usize) -> Result<u32, ControlError> {
    u32::try_from(value)
        .map_err(|_| ControlError::InvalidArgument(format!("order {value} out of range")))
}

fn to_cell(value: usize) -> Result<i32, ControlError> {
    i32::try_from(value)
        .map_err(|_| ControlError::InvalidArgument(format!("value {value} does not fit a cell")))
}

#[cfg(test)]
mod tests;
