//! FFI bindings for Biolock
//!
//! This module provides C-compatible functions for calling Biolock from the
//! mobile shell. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `biolock_free_string`.
//! Timestamps are supplied by the host in milliseconds.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Arc;

use crate::clock::{ManualClock, Millis};
use crate::config::EngineConfig;
use crate::error::AuthError;
use crate::features::classify_touch;
use crate::motion::MotionPattern;
use crate::pipeline::{replay_attempt_json, AttemptOutcome, LockEngine};
use crate::scorer::SimilarityScorer;
use crate::store::MemoryPatternStore;
use crate::types::{InputEvent, TouchPoint};

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

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Optional config argument: NULL means defaults
unsafe fn config_from_ptr(config_json: *const c_char) -> Result<EngineConfig, AuthError> {
    match cstr_to_string(config_json) {
        Some(json) => EngineConfig::from_json_str(&json),
        None => Ok(EngineConfig::default()),
    }
}

/// Map a result to a returned string, recording the error on failure
fn result_to_cstr(result: Result<String, AuthError>) -> *mut c_char {
    match result {
        Ok(s) => string_to_cstr(&s),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

fn outcome_to_json(outcome: Option<AttemptOutcome>) -> Result<String, AuthError> {
    match outcome {
        Some(outcome) => outcome.to_json(),
        None => Ok("null".to_string()),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Replay a captured attempt and return the outcome JSON.
///
/// The request is `{"events": [...], "config": {...}?, "enrolled": {...}?}`.
///
/// # Safety
/// - `request_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `biolock_free_string`.
/// - Returns NULL on error; call `biolock_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn biolock_replay_attempt(request_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let request = match cstr_to_string(request_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid request string pointer");
            return ptr::null_mut();
        }
    };

    result_to_cstr(replay_attempt_json(&request))
}

/// Compare two motion pattern JSON arrays and return the match report JSON.
///
/// # Safety
/// - `candidate_json` and `reference_json` must be valid null-terminated C strings.
/// - `config_json` may be NULL to use the default configuration.
/// - Returns a newly allocated string that must be freed with `biolock_free_string`.
/// - Returns NULL on error; call `biolock_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn biolock_score_patterns(
    candidate_json: *const c_char,
    reference_json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let candidate = match cstr_to_string(candidate_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid candidate string pointer");
            return ptr::null_mut();
        }
    };

    let reference = match cstr_to_string(reference_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid reference string pointer");
            return ptr::null_mut();
        }
    };

    let result = config_from_ptr(config_json).and_then(|config| {
        let candidate: MotionPattern = serde_json::from_str(&candidate)?;
        let reference: MotionPattern = serde_json::from_str(&reference)?;
        let report = SimilarityScorer::from_config(&config.motion).compare(&candidate, &reference)?;
        Ok(serde_json::to_string(&report)?)
    });
    result_to_cstr(result)
}

/// Classify a touch position on a key and return the side name.
///
/// # Safety
/// - `config_json` may be NULL to use the default key geometry.
/// - Returns a newly allocated string that must be freed with `biolock_free_string`.
/// - Returns NULL on error; call `biolock_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn biolock_classify_touch(
    x: f64,
    y: f64,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let result = config_from_ptr(config_json)
        .map(|config| classify_touch(TouchPoint { x, y }, &config.touch).to_string());
    result_to_cstr(result)
}

// ============================================================================
// Stateful Engine API
// ============================================================================

/// Opaque handle to a LockEngine driven by host timestamps
pub struct BiolockEngineHandle {
    clock: Arc<ManualClock>,
    engine: LockEngine<Arc<ManualClock>, MemoryPatternStore>,
}

/// Create an engine.
///
/// A supplied `store_json` is a store saved earlier with
/// `biolock_engine_save_store`, so its enrolled pattern is kept even when the
/// config asks to clear enrollment on start.
///
/// # Safety
/// - `config_json` and `store_json` may be NULL for defaults and an empty store.
/// - Returns a pointer that must be freed with `biolock_engine_free`.
/// - Returns NULL on error; call `biolock_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn biolock_engine_new(
    config_json: *const c_char,
    store_json: *const c_char,
) -> *mut BiolockEngineHandle {
    clear_last_error();

    let mut config = match config_from_ptr(config_json) {
        Ok(config) => config,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let store = match cstr_to_string(store_json) {
        Some(json) => match MemoryPatternStore::from_json(&json) {
            Ok(store) => {
                config.motion.clear_on_start = false;
                store
            }
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        },
        None => MemoryPatternStore::new(),
    };

    let clock = Arc::new(ManualClock::new(0));
    match LockEngine::new(config, Arc::clone(&clock), store) {
        Ok(engine) => Box::into_raw(Box::new(BiolockEngineHandle { clock, engine })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `biolock_engine_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn biolock_engine_free(handle: *mut BiolockEngineHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Open a new attempt at `now_ms`.
///
/// Returns `{"id": ..., "replaced": ...}`, where `replaced` is the id of an
/// attempt that was still open and got discarded, or null.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `biolock_engine_new`.
/// - Returns a newly allocated string that must be freed with `biolock_free_string`.
/// - Returns NULL on error; call `biolock_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn biolock_engine_begin_attempt(
    handle: *mut BiolockEngineHandle,
    now_ms: Millis,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &mut *handle;
    handle.clock.set(now_ms);
    let start = handle.engine.begin_attempt();
    result_to_cstr(serde_json::to_string(&start).map_err(AuthError::from))
}

/// Feed one event JSON into the engine.
///
/// Returns the outcome JSON when the event concluded the attempt, otherwise the
/// string `null`.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `biolock_engine_new`.
/// - `event_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `biolock_free_string`.
/// - Returns NULL on error; call `biolock_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn biolock_engine_handle_event(
    handle: *mut BiolockEngineHandle,
    event_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &mut *handle;

    let event_str = match cstr_to_string(event_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid event string pointer");
            return ptr::null_mut();
        }
    };

    let result = serde_json::from_str::<InputEvent>(&event_str)
        .map_err(AuthError::from)
        .and_then(|event| {
            handle.clock.set(event.timestamp());
            handle.engine.handle(event)
        })
        .and_then(outcome_to_json);
    result_to_cstr(result)
}

/// Time out the open attempt if it is older than the configured limit at
/// `now_ms`. Returns the outcome JSON or the string `null`.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `biolock_engine_new`.
/// - Returns a newly allocated string that must be freed with `biolock_free_string`.
#[no_mangle]
pub unsafe extern "C" fn biolock_engine_tick(
    handle: *mut BiolockEngineHandle,
    now_ms: Millis,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &mut *handle;
    handle.clock.set(now_ms);
    result_to_cstr(outcome_to_json(handle.engine.tick()))
}

/// Enroll a motion pattern JSON array. Returns the enrolled pattern JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `biolock_engine_new`.
/// - `pattern_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `biolock_free_string`.
/// - Returns NULL on error; call `biolock_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn biolock_engine_enroll(
    handle: *mut BiolockEngineHandle,
    pattern_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &mut *handle;

    let pattern_str = match cstr_to_string(pattern_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid pattern string pointer");
            return ptr::null_mut();
        }
    };

    let result = serde_json::from_str::<MotionPattern>(&pattern_str)
        .map_err(AuthError::from)
        .and_then(|pattern| handle.engine.enroll(pattern))
        .and_then(|enrolled| enrolled.to_json());
    result_to_cstr(result)
}

/// Hold a live motion pattern JSON array for the next evaluation.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `biolock_engine_new`.
/// - `pattern_json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `biolock_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn biolock_engine_submit_motion(
    handle: *mut BiolockEngineHandle,
    pattern_json: *const c_char,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    let handle = &mut *handle;

    let pattern_str = match cstr_to_string(pattern_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid pattern string pointer");
            return -1;
        }
    };

    match serde_json::from_str::<MotionPattern>(&pattern_str) {
        Ok(pattern) => {
            handle.engine.submit_motion_trace(pattern);
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Save the engine's pattern store to JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `biolock_engine_new`.
/// - Returns a newly allocated string that must be freed with `biolock_free_string`.
/// - Returns NULL on error; call `biolock_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn biolock_engine_save_store(
    handle: *mut BiolockEngineHandle,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &*handle;
    result_to_cstr(handle.engine.store().to_json().map_err(AuthError::from))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Biolock functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Biolock function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn biolock_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Biolock function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn biolock_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Biolock library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn biolock_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::AttemptStart;
    use crate::types::{Acceleration, MotionSample, Rotation};
    use std::ffi::CString;

    fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        unsafe {
            let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
            biolock_free_string(ptr);
            s
        }
    }

    fn code_events(code: &str) -> Vec<InputEvent> {
        code.chars()
            .enumerate()
            .flat_map(|(i, symbol)| {
                let t = i as Millis * 300;
                [
                    InputEvent::KeyPress { symbol, t },
                    InputEvent::KeyRelease { symbol, t: t + 100 },
                ]
            })
            .collect()
    }

    fn pattern_json(amplitude: f64) -> CString {
        let samples: Vec<MotionSample> = (0..30)
            .map(|i| {
                let x = (i as f64 / 4.0).sin() * amplitude;
                MotionSample::new(
                    i as Millis * 100,
                    Rotation::new(x, 0.0, x),
                    Acceleration::new(x, 0.0, 0.0),
                )
            })
            .collect();
        CString::new(serde_json::to_string(&samples).unwrap()).unwrap()
    }

    #[test]
    fn test_ffi_replay_attempt() {
        let request = serde_json::json!({ "events": code_events("111111") });
        let request = CString::new(request.to_string()).unwrap();

        let json = take_string(unsafe { biolock_replay_attempt(request.as_ptr()) });
        let outcome: AttemptOutcome = serde_json::from_str(&json).unwrap();
        assert!(outcome.verdict.accepted);
    }

    #[test]
    fn test_ffi_score_patterns() {
        let a = pattern_json(1.0);
        let b = pattern_json(1.0);
        let json = take_string(unsafe {
            biolock_score_patterns(a.as_ptr(), b.as_ptr(), ptr::null())
        });
        assert!(json.contains("\"matched\":true"));
    }

    #[test]
    fn test_ffi_classify_touch() {
        let side = take_string(unsafe { biolock_classify_touch(30.0, 30.0, ptr::null()) });
        assert_eq!(side, "center");
        let side = take_string(unsafe { biolock_classify_touch(2.0, 30.0, ptr::null()) });
        assert_eq!(side, "left");
    }

    #[test]
    fn test_ffi_engine_lifecycle() {
        let config = CString::new(r#"{"motion": {"enabled": true}}"#).unwrap();
        unsafe {
            let engine = biolock_engine_new(config.as_ptr(), ptr::null());
            assert!(!engine.is_null());

            let enrolled = take_string(biolock_engine_enroll(engine, pattern_json(1.0).as_ptr()));
            assert!(enrolled.contains("enrolled_at"));

            let start: AttemptStart =
                serde_json::from_str(&take_string(biolock_engine_begin_attempt(engine, 0)))
                    .unwrap();
            assert_eq!(start.replaced, None);
            assert_eq!(biolock_engine_submit_motion(engine, pattern_json(1.0).as_ptr()), 0);

            let mut last = String::new();
            for event in code_events("111111") {
                let event = CString::new(serde_json::to_string(&event).unwrap()).unwrap();
                last = take_string(biolock_engine_handle_event(engine, event.as_ptr()));
            }
            let outcome: AttemptOutcome = serde_json::from_str(&last).unwrap();
            assert!(outcome.verdict.accepted);
            assert!(outcome.motion.unwrap().is_match());

            let store = take_string(biolock_engine_save_store(engine));
            assert!(store.contains("enrolledMotionPattern"));

            biolock_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_engine_restores_saved_store() {
        let config = CString::new(r#"{"motion": {"enabled": true}}"#).unwrap();
        unsafe {
            let engine = biolock_engine_new(config.as_ptr(), ptr::null());
            take_string(biolock_engine_enroll(engine, pattern_json(1.0).as_ptr()));
            let saved = CString::new(take_string(biolock_engine_save_store(engine))).unwrap();
            biolock_engine_free(engine);

            let engine = biolock_engine_new(config.as_ptr(), saved.as_ptr());
            assert!(!engine.is_null());
            take_string(biolock_engine_begin_attempt(engine, 0));
            assert_eq!(biolock_engine_submit_motion(engine, pattern_json(1.0).as_ptr()), 0);

            let mut last = String::new();
            for event in code_events("111111") {
                let event = CString::new(serde_json::to_string(&event).unwrap()).unwrap();
                last = take_string(biolock_engine_handle_event(engine, event.as_ptr()));
            }
            let outcome: AttemptOutcome = serde_json::from_str(&last).unwrap();
            assert!(outcome.verdict.accepted);
            biolock_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_engine_tick_reports_null_until_timeout() {
        unsafe {
            let engine = biolock_engine_new(ptr::null(), ptr::null());
            take_string(biolock_engine_begin_attempt(engine, 1_000));
            assert_eq!(take_string(biolock_engine_tick(engine, 2_000)), "null");
            let json = take_string(biolock_engine_tick(engine, 61_000));
            let outcome: AttemptOutcome = serde_json::from_str(&json).unwrap();
            assert!(outcome.timed_out);

            let event =
                CString::new(r#"{"kind": "key_press", "symbol": "1", "t": 61500}"#).unwrap();
            assert_eq!(take_string(biolock_engine_handle_event(engine, event.as_ptr())), "null");
            biolock_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid = CString::new("not json").unwrap();
            let result = biolock_replay_attempt(invalid.as_ptr());
            assert!(result.is_null());

            let error = biolock_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(!error_str.is_empty());

            let bad_config = CString::new(r#"{"pin": {"secret": "12"}}"#).unwrap();
            assert!(biolock_engine_new(bad_config.as_ptr(), ptr::null()).is_null());
            assert!(!biolock_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = biolock_version();
            assert!(!version.is_null());
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, crate::BIOLOCK_VERSION);
        }
    }
}
