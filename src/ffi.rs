//! FFI bindings for Gesture Flux
//!
//! C ABI for driving the analyzer from a host application (camera pipeline,
//! call server). Records and reports cross the boundary as JSON. Every
//! returned string is owned by the caller and released with
//! `flux_free_string`; NULL means failure and `flux_last_error` says why.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::Utc;

use crate::config::FluxConfig;
use crate::encoder::{CounterReport, ReportEncoder};
use crate::error::FluxError;
use crate::pipeline::FrameAnalyzer;
use crate::schema::FrameRecord;
use crate::types::SessionKey;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(err: &FluxError) {
    let msg = err.to_string();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = CString::new(msg).ok());
}

/// Run one FFI entry point: reset the thread's error slot, then hand back the
/// JSON as an owned C string or record the failure and return NULL.
fn guarded(f: impl FnOnce() -> Result<String, FluxError>) -> *mut c_char {
    LAST_ERROR.with(|slot| slot.borrow_mut().take());
    match f().and_then(|json| {
        CString::new(json).map_err(|e| FluxError::EncodingError(e.to_string()))
    }) {
        Ok(json) => json.into_raw(),
        Err(e) => {
            set_last_error(&e);
            ptr::null_mut()
        }
    }
}

/// Borrow a C string argument as UTF-8
unsafe fn str_arg<'a>(raw: *const c_char, name: &str) -> Result<&'a str, FluxError> {
    if raw.is_null() {
        return Err(FluxError::InvalidArgument(format!("{name} is NULL")));
    }
    CStr::from_ptr(raw)
        .to_str()
        .map_err(|_| FluxError::InvalidArgument(format!("{name} is not valid UTF-8")))
}

unsafe fn analyzer_arg<'a>(raw: *const FluxAnalyzerHandle) -> Result<&'a FluxAnalyzerHandle, FluxError> {
    raw.as_ref()
        .ok_or_else(|| FluxError::InvalidArgument("analyzer is NULL".to_string()))
}

/// NULL means the default configuration
unsafe fn config_arg(raw: *const c_char) -> Result<FluxConfig, FluxError> {
    if raw.is_null() {
        return Ok(FluxConfig::default());
    }
    FluxConfig::from_json(str_arg(raw, "config_json")?)
}

unsafe fn record_arg(raw: *const c_char) -> Result<FrameRecord, FluxError> {
    Ok(serde_json::from_str(str_arg(raw, "record_json")?)?)
}

unsafe fn key_arg(raw: *const c_char) -> Result<SessionKey, FluxError> {
    str_arg(raw, "session_key").map(SessionKey::from)
}

fn unknown_session(key: &SessionKey) -> FluxError {
    FluxError::InvalidArgument(format!("unknown session: {key}"))
}

/// Evaluate a single gesture.frame.v1 record against a fresh analyzer and
/// return the report JSON.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string or NULL (defaults).
/// - `record_json` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn flux_evaluate_once(
    config_json: *const c_char,
    record_json: *const c_char,
) -> *mut c_char {
    guarded(|| {
        let analyzer = FrameAnalyzer::new(config_arg(config_json)?)?;
        let report = analyzer.evaluate_record(record_arg(record_json)?)?;
        ReportEncoder::new().encode_to_json(report)
    })
}

/// Opaque analyzer handle; one per host process is typical
pub struct FluxAnalyzerHandle {
    analyzer: FrameAnalyzer,
    encoder: ReportEncoder,
}

/// Create an analyzer from a JSON configuration, or NULL when it is invalid.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string or NULL (defaults).
/// - The handle must be released with `flux_analyzer_free`.
#[no_mangle]
pub unsafe extern "C" fn flux_analyzer_new(config_json: *const c_char) -> *mut FluxAnalyzerHandle {
    LAST_ERROR.with(|slot| slot.borrow_mut().take());
    match config_arg(config_json).and_then(FrameAnalyzer::new) {
        Ok(analyzer) => Box::into_raw(Box::new(FluxAnalyzerHandle {
            analyzer,
            encoder: ReportEncoder::new(),
        })),
        Err(e) => {
            set_last_error(&e);
            ptr::null_mut()
        }
    }
}

/// Free an analyzer and every session it holds.
///
/// # Safety
/// - `analyzer` must come from `flux_analyzer_new` (or be NULL) and is invalid afterwards.
#[no_mangle]
pub unsafe extern "C" fn flux_analyzer_free(analyzer: *mut FluxAnalyzerHandle) {
    if !analyzer.is_null() {
        drop(Box::from_raw(analyzer));
    }
}

/// Evaluate one gesture.frame.v1 record and return the frame report JSON.
///
/// The handle may be shared between threads; frames of different sessions
/// are evaluated in parallel.
///
/// # Safety
/// - `analyzer` must come from `flux_analyzer_new`.
/// - `record_json` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn flux_analyzer_evaluate(
    analyzer: *const FluxAnalyzerHandle,
    record_json: *const c_char,
) -> *mut c_char {
    guarded(|| {
        let handle = analyzer_arg(analyzer)?;
        let report = handle.analyzer.evaluate_record(record_arg(record_json)?)?;
        handle.encoder.encode_to_json(report)
    })
}

/// Latest counters of a session; NULL for an unknown session.
///
/// # Safety
/// - `analyzer` must come from `flux_analyzer_new`.
/// - `session_key` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn flux_analyzer_counters(
    analyzer: *const FluxAnalyzerHandle,
    session_key: *const c_char,
) -> *mut c_char {
    guarded(|| {
        let handle = analyzer_arg(analyzer)?;
        let key = key_arg(session_key)?;
        let counters = handle
            .analyzer
            .counters(&key)
            .ok_or_else(|| unknown_session(&key))?;
        handle.encoder.encode_to_json(CounterReport::new(&key, counters))
    })
}

/// End a session and return its final summary; NULL for an unknown session.
///
/// # Safety
/// - `analyzer` must come from `flux_analyzer_new`.
/// - `session_key` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn flux_analyzer_end_session(
    analyzer: *const FluxAnalyzerHandle,
    session_key: *const c_char,
) -> *mut c_char {
    guarded(|| {
        let handle = analyzer_arg(analyzer)?;
        let key = key_arg(session_key)?;
        let summary = handle
            .analyzer
            .end_session(&key)
            .ok_or_else(|| unknown_session(&key))?;
        handle.encoder.encode_to_json(summary)
    })
}

/// Remove sessions idle longer than the configured timeout. Returns how many
/// were removed, or -1 for a NULL handle.
///
/// # Safety
/// - `analyzer` must come from `flux_analyzer_new`.
#[no_mangle]
pub unsafe extern "C" fn flux_analyzer_sweep_idle(analyzer: *const FluxAnalyzerHandle) -> i32 {
    LAST_ERROR.with(|slot| slot.borrow_mut().take());
    match analyzer_arg(analyzer) {
        Ok(handle) => {
            let removed = handle.analyzer.sweep_idle(Utc::now());
            i32::try_from(removed.len()).unwrap_or(i32::MAX)
        }
        Err(e) => {
            set_last_error(&e);
            -1
        }
    }
}

/// Free a string returned by any `flux_*` function.
///
/// # Safety
/// - `ptr` must come from a Flux function (or be NULL) and is invalid afterwards.
#[no_mangle]
pub unsafe extern "C" fn flux_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Message of the last failed call on this thread, or NULL.
///
/// # Safety
/// - The pointer stays valid until the next Flux call on this thread. Do NOT free it.
#[no_mangle]
pub unsafe extern "C" fn flux_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map_or(ptr::null(), |msg| msg.as_ptr()))
}

/// Library version as a static string. Do NOT free.
///
/// # Safety
/// - Always safe to call.
#[no_mangle]
pub unsafe extern "C" fn flux_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn raised_hand_record(user: &str, timestamp: f64) -> CString {
        let record = FrameRecord::new(
            user,
            timestamp,
            crate::types::LandmarkPayload::with_pose(
                crate::detectors::fixtures::raised_hand_pose(),
            ),
        )
        .with_room("room1")
        .with_behaviors(vec![crate::types::BehaviorKind::HandRaise]);
        CString::new(serde_json::to_string(&record).unwrap()).unwrap()
    }

    unsafe fn take_string(ptr: *mut c_char) -> serde_json::Value {
        assert!(!ptr.is_null());
        let value = serde_json::from_str(CStr::from_ptr(ptr).to_str().unwrap()).unwrap();
        flux_free_string(ptr);
        value
    }

    #[test]
    fn test_ffi_evaluate_once() {
        let record = raised_hand_record("alice", 1.0);
        unsafe {
            let report = take_string(flux_evaluate_once(ptr::null(), record.as_ptr()));
            assert_eq!(report["actions"]["hand_raise"], 1);
            assert!(report.get("producer").is_some());
        }
    }

    #[test]
    fn test_ffi_analyzer_lifecycle() {
        unsafe {
            let analyzer = flux_analyzer_new(ptr::null());
            assert!(!analyzer.is_null());

            let first = raised_hand_record("alice", 1.0);
            let report = take_string(flux_analyzer_evaluate(analyzer, first.as_ptr()));
            assert_eq!(report["session_key"], "room1:alice");
            assert_eq!(report["counters"]["hand_raise"]["event_count"], 1);

            // Same timestamp again is rejected and changes nothing
            let report = take_string(flux_analyzer_evaluate(analyzer, first.as_ptr()));
            assert_eq!(report["actions"]["hand_raise"], 0);
            assert_eq!(report["evaluations"][0]["admission"], "rejected");

            let key = CString::new("room1:alice").unwrap();
            let counters = take_string(flux_analyzer_counters(analyzer, key.as_ptr()));
            assert_eq!(counters["counters"]["hand_raise"]["event_count"], 1);

            let summary = take_string(flux_analyzer_end_session(analyzer, key.as_ptr()));
            assert_eq!(summary["counters"]["hand_raise"]["event_count"], 1);

            // Session is gone
            assert!(flux_analyzer_counters(analyzer, key.as_ptr()).is_null());
            assert!(!flux_last_error().is_null());

            assert_eq!(flux_analyzer_sweep_idle(analyzer), 0);
            flux_analyzer_free(analyzer);
        }
    }

    #[test]
    fn test_ffi_custom_config() {
        let config = CString::new(r#"{"behaviors":{"hand_raise":{"trigger_threshold":2,"buffer_capacity":20}}}"#).unwrap();
        unsafe {
            let analyzer = flux_analyzer_new(config.as_ptr());
            assert!(!analyzer.is_null());

            let record = raised_hand_record("bob", 1.0);
            let report = take_string(flux_analyzer_evaluate(analyzer, record.as_ptr()));
            assert_eq!(report["actions"]["hand_raise"], 0);
            assert_eq!(report["counters"]["hand_raise"]["raw_count"], 1);

            flux_analyzer_free(analyzer);
        }
    }

    #[test]
    fn test_ffi_invalid_config() {
        let config = CString::new(r#"{"sway_weight_x":0.1,"sway_weight_z":0.5}"#).unwrap();
        unsafe {
            let analyzer = flux_analyzer_new(config.as_ptr());
            assert!(analyzer.is_null());

            let error = flux_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("configuration"));
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let analyzer = flux_analyzer_new(ptr::null());
            let invalid_json = CString::new("not json").unwrap();

            let result = flux_analyzer_evaluate(analyzer, invalid_json.as_ptr());
            assert!(result.is_null());

            let error = flux_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(!error_str.is_empty());

            assert!(flux_analyzer_evaluate(ptr::null(), invalid_json.as_ptr()).is_null());
            assert_eq!(flux_analyzer_sweep_idle(ptr::null()), -1);
            assert!(flux_analyzer_counters(analyzer, ptr::null()).is_null());
            let error_str = CStr::from_ptr(flux_last_error()).to_str().unwrap();
            assert!(error_str.contains("session_key"));
            flux_analyzer_free(analyzer);
        }
    }

    #[test]
    fn test_ffi_counters_single_envelope() {
        unsafe {
            let analyzer = flux_analyzer_new(ptr::null());
            let record = raised_hand_record("carol", 1.0);
            flux_free_string(flux_analyzer_evaluate(analyzer, record.as_ptr()));

            let key = CString::new("room1:carol").unwrap();
            let counters = take_string(flux_analyzer_counters(analyzer, key.as_ptr()));
            assert_eq!(counters["session_key"], "room1:carol");
            assert_eq!(counters["report_version"], crate::encoder::REPORT_VERSION);
            assert_eq!(counters["producer"]["name"], crate::PRODUCER_NAME);
            assert!(counters.get("body").is_none());
            assert!(flux_last_error().is_null());

            flux_analyzer_free(analyzer);
        }
    }

    #[test]
    fn test_ffi_successful_call_clears_error() {
        unsafe {
            let analyzer = flux_analyzer_new(ptr::null());
            let bad = CString::new("{}").unwrap();
            assert!(flux_analyzer_evaluate(analyzer, bad.as_ptr()).is_null());
            assert!(!flux_last_error().is_null());

            let record = raised_hand_record("dan", 1.0);
            take_string(flux_analyzer_evaluate(analyzer, record.as_ptr()));
            assert!(flux_last_error().is_null());

            flux_analyzer_free(analyzer);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = flux_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
