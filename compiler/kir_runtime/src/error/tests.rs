use kir_codegen::CodegenError;
use kir_driver::status::{CL_BUILD_PROGRAM_FAILURE, CL_OUT_OF_RESOURCES};
use kir_driver::DriverError;
use pretty_assertions::assert_eq;

use super::*;

fn fault(work_item: usize, message: &str) -> ItemFault {
    ItemFault {
        work_item,
        fault: KernelFault::new(message),
    }
}

#[test]
fn codegen_errors_keep_their_kind() {
    assert_eq!(
        Error::from(CodegenError::Configuration("no entry".into())),
        Error::Configuration("no entry".into())
    );
    assert_eq!(
        Error::from(CodegenError::Unsupported {
            construct: "monitor enter".into()
        }),
        Error::Unsupported {
            construct: "monitor enter".into()
        }
    );
    assert_eq!(
        Error::from(CodegenError::NotYetImplemented {
            construct: "multi-dimensional array allocation".into()
        }),
        Error::NotYetImplemented {
            construct: "multi-dimensional array allocation".into()
        }
    );
    assert!(matches!(
        Error::from(CodegenError::InternalInvariant {
            message: "arity".into()
        }),
        Error::Internal { .. }
    ));
}

#[test]
fn native_failures_carry_the_status() {
    let err = Error::from(DriverError::NativeCallFailure {
        call: "clFinish",
        status: CL_OUT_OF_RESOURCES,
    });
    assert_eq!(err.status(), Some(CL_OUT_OF_RESOURCES));
    assert_eq!(
        err.to_string(),
        "clFinish failed with status -5 (CL_OUT_OF_RESOURCES)"
    );
}

#[test]
fn missing_library_is_a_configuration_error() {
    let err = Error::from(DriverError::LibraryUnavailable {
        tried: vec!["libOpenCL.so.1".into()],
    });
    assert!(matches!(err, Error::Configuration(_)));
    assert_eq!(err.status(), None);
}

#[test]
fn build_log_is_appended_to_the_message() {
    let err = Error::NativeCall {
        call: "clBuildProgram",
        status: CL_BUILD_PROGRAM_FAILURE,
        log: Some("line 3: unknown type\n".into()),
    };
    assert_eq!(
        err.to_string(),
        "clBuildProgram failed with status -11 (CL_BUILD_PROGRAM_FAILURE):\nline 3: unknown type"
    );
}

#[test]
fn execution_failure_orders_faults_by_work_item() {
    let failure = ExecutionFailure::new(10, vec![fault(7, "b"), fault(2, "a"), fault(5, "c")]);
    assert_eq!(failure.work_items().collect::<Vec<_>>(), vec![2, 5, 7]);
    assert_eq!(failure.to_string(), "3 of 10 work-items failed; work-item 2: a");
}

#[test]
fn collect_faults_is_ok_only_without_faults() {
    assert_eq!(collect_faults(4, Vec::new()), Ok(()));
    let err = collect_faults(4, vec![fault(1, "x")]);
    assert!(matches!(err, Err(Error::Execution(ref failure)) if failure.faults.len() == 1));
}

#[test]
fn panic_payloads_become_messages() {
    let text: Box<dyn std::any::Any + Send> = Box::new("static text");
    assert_eq!(KernelFault::from_panic(text.as_ref()).message(), "static text");

    let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("owned text"));
    assert_eq!(KernelFault::from_panic(owned.as_ref()).message(), "owned text");

    let other: Box<dyn std::any::Any + Send> = Box::new(42u8);
    assert_eq!(KernelFault::from_panic(other.as_ref()).message(), "work-item panicked");
}
