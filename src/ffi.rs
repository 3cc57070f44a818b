//! FFI bindings for the affect engine
//!
//! This module provides C-compatible functions for driving a [`FusionCombiner`]
//! from other languages. All functions use C strings (null-terminated) and
//! return allocated memory that must be freed by the caller using
//! `affect_free_string`. Times are passed as Unix epoch milliseconds.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, TimeZone, Utc};

use crate::config::EngineConfig;
use crate::encoder::SnapshotEncoder;
use crate::error::AffectError;
use crate::fusion::FusionCombiner;
use crate::schema::InputAdapter;
use crate::types::FusionResult;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>, AffectError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| AffectError::ParseError(format!("Timestamp out of range: {ms}")))
}

fn result_to_cstr(result: Result<FusionResult, AffectError>) -> *mut c_char {
    match result.and_then(|r| Ok(serde_json::to_string(&r)?)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Engine API
// ============================================================================

/// Opaque handle to a FusionCombiner
pub struct AffectEngineHandle {
    engine: FusionCombiner,
    encoder: SnapshotEncoder,
}

/// Create a new engine.
///
/// # Safety
/// - `config_json` may be NULL (defaults) or a valid null-terminated C string
///   holding an engine configuration.
/// - Must be freed with `affect_engine_free`.
/// - Returns NULL on error; call `affect_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn affect_engine_new(
    config_json: *const c_char,
    now_ms: i64,
) -> *mut AffectEngineHandle {
    clear_last_error();

    let now = match millis_to_utc(now_ms) {
        Ok(now) => now,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let config = if config_json.is_null() {
        EngineConfig::default()
    } else {
        let parsed = cstr_to_string(config_json)
            .ok_or_else(|| AffectError::ParseError("Invalid config string pointer".to_string()))
            .and_then(|json| EngineConfig::from_json(&json));
        match parsed {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let handle = Box::new(AffectEngineHandle {
        engine: FusionCombiner::new(config, now),
        encoder: SnapshotEncoder::new(),
    });
    Box::into_raw(handle)
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `affect_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn affect_engine_free(engine: *mut AffectEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Start behavior capture and auto-analysis.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `affect_engine_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn affect_engine_start(engine: *mut AffectEngineHandle, now_ms: i64) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    match millis_to_utc(now_ms) {
        Ok(now) => {
            (*engine).engine.start(now);
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Stop behavior capture and auto-analysis.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `affect_engine_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn affect_engine_stop(engine: *mut AffectEngineHandle) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    (*engine).engine.stop();
    0
}

/// Apply one affect.input.v1 record.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `affect_engine_new`.
/// - `record_json` must be a valid null-terminated C string.
/// - Returns the result JSON when the record triggered an analysis, or NULL
///   otherwise. A NULL return with a non-NULL `affect_last_error` is an error.
#[no_mangle]
pub unsafe extern "C" fn affect_engine_ingest(
    engine: *mut AffectEngineHandle,
    record_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &mut *engine;

    let json_str = match cstr_to_string(record_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid record string pointer");
            return ptr::null_mut();
        }
    };

    let record = match InputAdapter::parse_line(&json_str) {
        Ok(record) => record,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };
    if let Err(e) = record.validate() {
        set_last_error(&e.to_string());
        return ptr::null_mut();
    }

    match InputAdapter::apply(&mut handle.engine, &record) {
        Some(result) => result_to_cstr(Ok(result)),
        None => ptr::null_mut(),
    }
}

/// Store text as the sticky text and analyze.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `affect_engine_new`.
/// - `text` must be a valid null-terminated C string.
/// - Returns a newly allocated result JSON that must be freed with `affect_free_string`.
/// - Returns NULL on error; call `affect_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn affect_engine_feed_text(
    engine: *mut AffectEngineHandle,
    text: *const c_char,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &mut *engine;

    let text_str = match cstr_to_string(text) {
        Some(s) => s,
        None => {
            set_last_error("Invalid text string pointer");
            return ptr::null_mut();
        }
    };

    result_to_cstr(millis_to_utc(now_ms).map(|now| handle.engine.feed_text(&text_str, now)))
}

/// Run one analysis pass over the current inputs.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `affect_engine_new`.
/// - Returns a newly allocated result JSON that must be freed with `affect_free_string`.
/// - Returns NULL on error; call `affect_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn affect_engine_analyze(
    engine: *mut AffectEngineHandle,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &mut *engine;
    result_to_cstr(millis_to_utc(now_ms).map(|now| handle.engine.analyze(None, now)))
}

/// Drive the engine's periodic jobs.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `affect_engine_new`.
/// - Returns the result JSON when auto-analysis ran, NULL otherwise.
#[no_mangle]
pub unsafe extern "C" fn affect_engine_tick(
    engine: *mut AffectEngineHandle,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &mut *engine;
    let now = match millis_to_utc(now_ms) {
        Ok(now) => now,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match handle.engine.tick(now) {
        Some(result) => result_to_cstr(Ok(result)),
        None => ptr::null_mut(),
    }
}

/// Encode a full snapshot of the engine state.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `affect_engine_new`.
/// - Returns a newly allocated string that must be freed with `affect_free_string`.
/// - Returns NULL on error; call `affect_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn affect_engine_snapshot(
    engine: *mut AffectEngineHandle,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &*engine;
    let encoded =
        millis_to_utc(now_ms).and_then(|now| handle.encoder.encode_to_json(&handle.engine, now));
    match encoded {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Reset the engine and republish neutral.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `affect_engine_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn affect_engine_reset(engine: *mut AffectEngineHandle, now_ms: i64) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    match millis_to_utc(now_ms) {
        Ok(now) => {
            (*engine).engine.reset(now);
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by affect functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an affect function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn affect_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next affect function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn affect_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn affect_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    const T0_MS: i64 = 1_705_327_200_000;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        affect_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_engine_lifecycle() {
        unsafe {
            let engine = affect_engine_new(ptr::null(), T0_MS);
            assert!(!engine.is_null());
            assert_eq!(affect_engine_start(engine, T0_MS), 0);

            let record = CString::new(
                r#"{"type":"pointer_move","timestamp":"2024-01-15T14:00:00.100Z","x":1,"y":2}"#,
            )
            .unwrap();
            assert!(affect_engine_ingest(engine, record.as_ptr()).is_null());
            assert!(affect_last_error().is_null());

            let text = CString::new("so tired and exhausted").unwrap();
            let json = take_string(affect_engine_feed_text(engine, text.as_ptr(), T0_MS + 200));
            assert!(json.contains("\"label\""));

            let json = take_string(affect_engine_analyze(engine, T0_MS + 300));
            assert!(json.contains("\"source\""));

            assert!(affect_engine_tick(engine, T0_MS + 1_000).is_null());
            let ticked = take_string(affect_engine_tick(engine, T0_MS + 5_000));
            assert!(ticked.contains("\"timestamp\""));

            let snapshot = take_string(affect_engine_snapshot(engine, T0_MS + 5_000));
            assert!(snapshot.contains("affect.snapshot.v1"));

            assert_eq!(affect_engine_reset(engine, T0_MS + 6_000), 0);
            assert_eq!(affect_engine_stop(engine), 0);
            affect_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let bad_config = CString::new("not json").unwrap();
            let engine = affect_engine_new(bad_config.as_ptr(), T0_MS);
            assert!(engine.is_null());

            let error = affect_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());

            assert!(affect_engine_analyze(ptr::null_mut(), T0_MS).is_null());
            let error = CStr::from_ptr(affect_last_error()).to_str().unwrap();
            assert_eq!(error, "Null engine pointer");
        }
    }

    #[test]
    fn test_ffi_rejects_invalid_record() {
        unsafe {
            let engine = affect_engine_new(ptr::null(), T0_MS);
            let record = CString::new(
                r#"{"type":"keystroke","timestamp":"2024-01-15T14:00:00Z","key":""}"#,
            )
            .unwrap();
            assert!(affect_engine_ingest(engine, record.as_ptr()).is_null());
            assert!(!affect_last_error().is_null());
            affect_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = affect_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, crate::AFFECT_VERSION);
        }
    }
}
