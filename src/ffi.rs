//! FFI bindings for Steadypoint
//!
//! C-compatible entry points for driving the pipeline from a host
//! application (camera loop, accessibility shell). Strings are
//! null-terminated UTF-8; strings returned by this module must be freed with
//! `steady_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::Configuration;
use crate::error::CursorError;
use crate::pipeline::{replay_records, CursorPipeline};
use crate::schema::parse_ndjson;
use crate::types::{millis, ClickKind, DwellPhase, PositionSample};

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

/// NULL means "use defaults"
unsafe fn config_from_ptr(config_json: *const c_char) -> Result<Configuration, CursorError> {
    if config_json.is_null() {
        return Ok(Configuration::default());
    }
    match cstr_to_string(config_json) {
        Some(json) => Configuration::from_json(&json),
        None => Err(CursorError::ParseError(
            "configuration is not valid UTF-8".to_string(),
        )),
    }
}

/// `SteadyFrame.phase` values
pub const STEADY_PHASE_IDLE: i32 = 0;
pub const STEADY_PHASE_DWELLING: i32 = 1;
pub const STEADY_PHASE_COOLDOWN: i32 = 2;

/// `SteadyFrame.click_kind` values (`-1` when no click fired)
pub const STEADY_CLICK_NONE: i32 = -1;
pub const STEADY_CLICK_LEFT: i32 = 0;
pub const STEADY_CLICK_RIGHT: i32 = 1;
pub const STEADY_CLICK_MIDDLE: i32 = 2;
pub const STEADY_CLICK_DOUBLE: i32 = 3;

/// Per-frame result written by `steady_pipeline_update`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteadyFrame {
    pub x: f64,
    pub y: f64,
    /// 1 once the first valid sample has been seen
    pub tracking: i32,
    pub phase: i32,
    /// 1 on the frame a dwell fired
    pub clicked: i32,
    pub click_kind: i32,
}

fn phase_code(phase: DwellPhase) -> i32 {
    match phase {
        DwellPhase::Idle => STEADY_PHASE_IDLE,
        DwellPhase::Dwelling => STEADY_PHASE_DWELLING,
        DwellPhase::Cooldown => STEADY_PHASE_COOLDOWN,
    }
}

fn click_code(kind: ClickKind) -> i32 {
    match kind {
        ClickKind::Left => STEADY_CLICK_LEFT,
        ClickKind::Right => STEADY_CLICK_RIGHT,
        ClickKind::Middle => STEADY_CLICK_MIDDLE,
        ClickKind::Double => STEADY_CLICK_DOUBLE,
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Replay an NDJSON `cursor.sample.v1` recording and return the frames as a
/// JSON array.
///
/// # Safety
/// - `ndjson` must be a valid null-terminated C string.
/// - `config_json` must be a valid null-terminated C string or NULL for defaults.
/// - Returns a newly allocated string that must be freed with `steady_free_string`.
/// - Returns NULL on error; call `steady_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn steady_replay(
    ndjson: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let input = match cstr_to_string(ndjson) {
        Some(s) => s,
        None => {
            set_last_error("Invalid input string pointer");
            return ptr::null_mut();
        }
    };

    let result = config_from_ptr(config_json).and_then(|config| {
        let records = parse_ndjson(&input)?;
        let (frames, _) = replay_records(&records, &config)?;
        Ok(serde_json::to_string(&frames)?)
    });

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Pipeline API
// ============================================================================

/// Opaque handle to a CursorPipeline and its current configuration
pub struct SteadyPipelineHandle {
    pipeline: CursorPipeline,
    config: Configuration,
}

/// Create a pipeline.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string or NULL for defaults.
/// - Must be freed with `steady_pipeline_free`.
/// - Returns NULL on error; call `steady_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn steady_pipeline_new(config_json: *const c_char) -> *mut SteadyPipelineHandle {
    clear_last_error();

    match config_from_ptr(config_json) {
        Ok(config) => {
            let pipeline = CursorPipeline::for_config(&config);
            Box::into_raw(Box::new(SteadyPipelineHandle { pipeline, config }))
        }
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a pipeline.
///
/// # Safety
/// - `handle` must be a pointer returned by `steady_pipeline_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn steady_pipeline_free(handle: *mut SteadyPipelineHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Feed one frame.
///
/// `t_ms` is monotonic milliseconds since an arbitrary origin; `valid` is
/// non-zero when the landmark was detected (x and y are ignored otherwise).
///
/// # Safety
/// - `handle` must be a valid pointer returned by `steady_pipeline_new`.
/// - `out` must be NULL or point to writable memory for one `SteadyFrame`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn steady_pipeline_update(
    handle: *mut SteadyPipelineHandle,
    t_ms: f64,
    x: f64,
    y: f64,
    valid: i32,
    out: *mut SteadyFrame,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null pipeline pointer");
        return -1;
    }
    if !t_ms.is_finite() || t_ms < 0.0 {
        set_last_error("t_ms must be finite and non-negative");
        return -1;
    }

    let handle = &mut *handle;
    let timestamp = millis(t_ms);
    let sample = if valid != 0 {
        PositionSample::valid(x, y, timestamp)
    } else {
        PositionSample::lost(timestamp)
    };

    let output = handle.pipeline.process(&sample, &handle.config);

    if !out.is_null() {
        *out = SteadyFrame {
            x: output.position.x,
            y: output.position.y,
            tracking: output.tracking as i32,
            phase: phase_code(output.phase),
            clicked: output.click.is_some() as i32,
            click_kind: output
                .click
                .map(|c| click_code(c.kind))
                .unwrap_or(STEADY_CLICK_NONE),
        };
    }
    0
}

/// Replace the configuration; takes effect on the next update.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `steady_pipeline_new`.
/// - `config_json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error (the old configuration is kept).
#[no_mangle]
pub unsafe extern "C" fn steady_pipeline_set_config(
    handle: *mut SteadyPipelineHandle,
    config_json: *const c_char,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null pipeline pointer");
        return -1;
    }

    let json = match cstr_to_string(config_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match Configuration::from_json(&json) {
        Ok(config) => {
            (*handle).config = config;
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Recalibrate: drop filter and dwell state.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `steady_pipeline_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn steady_pipeline_reset(handle: *mut SteadyPipelineHandle) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null pipeline pointer");
        return -1;
    }
    (*handle).pipeline.reset();
    0
}

/// Session report as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `steady_pipeline_new`.
/// - Returns a newly allocated string that must be freed with `steady_free_string`.
/// - Returns NULL on error; call `steady_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn steady_pipeline_report(handle: *const SteadyPipelineHandle) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null pipeline pointer");
        return ptr::null_mut();
    }

    match (*handle).pipeline.report_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Steadypoint functions.
///
/// # Safety
/// - `ptr` must be a pointer returned by a Steadypoint function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn steady_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Steadypoint call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn steady_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn steady_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
