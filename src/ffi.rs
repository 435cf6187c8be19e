use std::ffi::{c_char, CStr, CString};
use std::path::PathBuf;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::config::load_or_default;

static LAST_ERROR: Lazy<Mutex<Option<CString>>> = Lazy::new(|| Mutex::new(None));

fn set_last_error(msg: &str) {
    let c = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    let mut guard = LAST_ERROR.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some(c);
}

fn clear_last_error() {
    let mut guard = LAST_ERROR.lock().unwrap_or_else(|e| e.into_inner());
    *guard = None;
}

fn take_cstr(ptr: *const c_char, name: &str) -> Result<String, String> {
    if ptr.is_null() {
        return Err(format!("{name} is null"));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(|s| s.to_string())
        .map_err(|_| format!("{name} is not valid UTF-8"))
}

fn convert_file(
    config: Option<PathBuf>,
    input: PathBuf,
    output: PathBuf,
) -> Result<(), (i32, String)> {
    let cfg = load_or_default(config.as_deref()).map_err(|e| (10, format!("{e:#}")))?;
    let converter = cfg.converter().map_err(|e| (10, format!("{e:#}")))?;
    let bytes = std::fs::read(&input)
        .map_err(|e| (11, format!("read input {}: {e}", input.display())))?;
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let out = converter
        .convert(&bytes, &file_name, None)
        .map_err(|e| (12, e.user_message()))?;
    std::fs::write(&output, &out.bytes)
        .map_err(|e| (13, format!("write output {}: {e}", output.display())))?;
    Ok(())
}

/// Convert a `.pages` file to `.docx` using `toolhub.toml` (null config = default search).
///
/// Returns 0 on success; non-zero on failure (see `th_last_error_utf8()`).
#[no_mangle]
pub extern "C" fn th_convert_pages(
    config_path: *const c_char,
    input_path: *const c_char,
    output_path: *const c_char,
) -> i32 {
    let cfg = if config_path.is_null() {
        None
    } else {
        match take_cstr(config_path, "config_path") {
            Ok(v) => Some(PathBuf::from(v)),
            Err(e) => {
                set_last_error(&e);
                return 2;
            }
        }
    };
    let input = match take_cstr(input_path, "input_path") {
        Ok(v) => v,
        Err(e) => {
            set_last_error(&e);
            return 3;
        }
    };
    let output = match take_cstr(output_path, "output_path") {
        Ok(v) => v,
        Err(e) => {
            set_last_error(&e);
            return 4;
        }
    };

    match convert_file(cfg, PathBuf::from(input), PathBuf::from(output)) {
        Ok(()) => {
            clear_last_error();
            0
        }
        Err((code, msg)) => {
            set_last_error(&msg);
            code
        }
    }
}

/// Returns the last error message as a UTF-8 C string pointer (or null if none).
/// The pointer is valid until the next `th_convert_pages` call.
#[no_mangle]
pub extern "C" fn th_last_error_utf8() -> *const c_char {
    let guard = LAST_ERROR.lock().unwrap_or_else(|e| e.into_inner());
    match guard.as_ref() {
        Some(s) => s.as_ptr(),
        None => std::ptr::null(),
    }
}
