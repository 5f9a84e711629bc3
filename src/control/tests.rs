use super::*;
use crate::constants::{DEFAULT_ORDER, DEFAULT_QSET, MAX_ORDER};
use crate::storage::Geometry;

fn create_test_plane() -> ControlPlane {
    ControlPlane::new(Defaults::new(Geometry::new(1, 10)).expect("test defaults"))
}

struct FaultingCell;

impl UserCell for FaultingCell {
    fn get(&self) -> Result<i32, BufferFault> {
        Err(BufferFault { at: 0 })
    }

    fn put(&mut self, _value: i32) -> Result<(), BufferFault> {
        Err(BufferFault { at: 0 })
    }
}

#[test]
fn test_reset() {
    let plane = create_test_plane();
    assert_eq!(plane.execute(ControlCommand::Reset, ControlArg::None), Ok(0));
    assert_eq!(
        plane.defaults().geometry(),
        Geometry::new(DEFAULT_ORDER, DEFAULT_QSET)
    );
}

#[test]
fn test_set_and_get_through_cell() {
    let plane = create_test_plane();

    let mut cell = 3i32;
    plane
        .execute(ControlCommand::Set(Parameter::Order), ControlArg::Cell(&mut cell))
        .unwrap();
    let mut cell = 64i32;
    plane
        .execute(ControlCommand::Set(Parameter::Qset), ControlArg::Cell(&mut cell))
        .unwrap();
    assert_eq!(plane.defaults().geometry(), Geometry::new(3, 64));

    let mut out = 0i32;
    plane
        .execute(ControlCommand::Get(Parameter::Order), ControlArg::Cell(&mut out))
        .unwrap();
    assert_eq!(out, 3);
    plane
        .execute(ControlCommand::Get(Parameter::Qset), ControlArg::Cell(&mut out))
        .unwrap();
    assert_eq!(out, 64);
}

#[test]
fn test_tell_and_query() {
    let plane = create_test_plane();

    assert_eq!(
        plane.execute(ControlCommand::Tell(Parameter::Qset), ControlArg::Value(42)),
        Ok(0)
    );
    assert_eq!(
        plane.execute(ControlCommand::Query(Parameter::Qset), ControlArg::None),
        Ok(42)
    );
    assert_eq!(
        plane.execute(ControlCommand::Query(Parameter::Order), ControlArg::None),
        Ok(1)
    );
}

#[test]
fn test_exchange_returns_previous_in_cell() {
    let plane = create_test_plane();

    let mut cell = 5i32;
    plane
        .execute(
            ControlCommand::Exchange(Parameter::Order),
            ControlArg::Cell(&mut cell),
        )
        .unwrap();
    assert_eq!(cell, 1);
    assert_eq!(plane.defaults().order(), 5);
}

#[test]
fn test_shift_returns_previous() {
    let plane = create_test_plane();

    assert_eq!(
        plane.execute(ControlCommand::Shift(Parameter::Qset), ControlArg::Value(20)),
        Ok(10)
    );
    assert_eq!(
        plane.execute(ControlCommand::Shift(Parameter::Qset), ControlArg::Value(30)),
        Ok(20)
    );
    assert_eq!(plane.defaults().qset(), 30);
}

#[test]
fn test_ioctl_by_code() {
    let plane = create_test_plane();

    let code = ControlCommand::Tell(Parameter::Order).code();
    assert_eq!(plane.ioctl(code, ControlArg::Value(2)), Ok(0));

    let mut cell = 0i32;
    let code = ControlCommand::Get(Parameter::Order).code();
    assert_eq!(plane.ioctl(code, ControlArg::Cell(&mut cell)), Ok(0));
    assert_eq!(cell, 2);

    assert_eq!(
        plane.ioctl(0x8142, ControlArg::None),
        Err(ControlError::NotSupported(0x8142))
    );
    assert_eq!(
        plane.ioctl(0x1234, ControlArg::None),
        Err(ControlError::NotSupported(0x1234))
    );
}

#[test]
fn test_missing_cell_is_a_fault() {
    let plane = create_test_plane();

    for command in [
        ControlCommand::Set(Parameter::Qset),
        ControlCommand::Get(Parameter::Order),
        ControlCommand::Exchange(Parameter::Qset),
    ] {
        assert_eq!(
            plane.execute(command, ControlArg::Value(4)),
            Err(ControlError::FaultyBuffer)
        );
    }
    assert_eq!(plane.defaults().geometry(), Geometry::new(1, 10));
}

#[test]
fn test_faulting_cell() {
    let plane = create_test_plane();

    let mut cell = FaultingCell;
    assert_eq!(
        plane.execute(ControlCommand::Set(Parameter::Qset), ControlArg::Cell(&mut cell)),
        Err(ControlError::FaultyBuffer)
    );
    assert_eq!(
        plane.execute(ControlCommand::Get(Parameter::Qset), ControlArg::Cell(&mut cell)),
        Err(ControlError::FaultyBuffer)
    );
    assert_eq!(plane.defaults().qset(), 10);
}

#[test]
fn test_by_value_commands_reject_cells() {
    let plane = create_test_plane();

    let mut cell = 7i32;
    assert!(matches!(
        plane.execute(ControlCommand::Tell(Parameter::Qset), ControlArg::Cell(&mut cell)),
        Err(ControlError::InvalidArgument(_))
    ));
    assert!(matches!(
        plane.execute(ControlCommand::Shift(Parameter::Order), ControlArg::None),
        Err(ControlError::InvalidArgument(_))
    ));
}

#[test]
fn test_invalid_values_leave_defaults() {
    let plane = create_test_plane();

    let mut cell = -1i32;
    assert!(matches!(
        plane.execute(ControlCommand::Set(Parameter::Qset), ControlArg::Cell(&mut cell)),
        Err(ControlError::InvalidArgument(_))
    ));
    assert!(plane
        .execute(ControlCommand::Tell(Parameter::Qset), ControlArg::Value(0))
        .is_err());
    assert!(plane
        .execute(
            ControlCommand::Tell(Parameter::Order),
            ControlArg::Value(u64::from(MAX_ORDER) + 1)
        )
        .is_err());

    let mut cell = (MAX_ORDER + 1) as i32;
    assert!(plane
        .execute(
            ControlCommand::Exchange(Parameter::Order),
            ControlArg::Cell(&mut cell)
        )
        .is_err());
    assert_eq!(cell, (MAX_ORDER + 1) as i32);

    assert!(plane
        .execute(ControlCommand::Shift(Parameter::Qset), ControlArg::Value(u64::MAX))
        .is_err());
    assert_eq!(plane.defaults().geometry(), Geometry::new(1, 10));
}
