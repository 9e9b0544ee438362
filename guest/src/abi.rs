//! WebAssembly exports called by the policy host
//!
//! The host copies input into a buffer obtained from `alloc`, calls an entry
//! point and receives the response buffer packed as `(ptr << 32) | len`. Both
//! buffers are released by the host through `dealloc`. A return value of `0`
//! means the guest could not produce a response.

use crate::logger::{HostLogger, PolicyLogger};
use crate::PolicyResult;
use std::slice;

#[no_mangle]
pub extern "C" fn alloc(len: i32) -> i32 {
    if len <= 0 {
        return 0;
    }
    let buf = vec![0u8; len as usize].into_boxed_slice();
    Box::into_raw(buf) as *mut u8 as i32
}

#[no_mangle]
pub extern "C" fn dealloc(ptr: i32, len: i32) {
    if ptr == 0 || len <= 0 {
        return;
    }
    unsafe {
        let raw = slice::from_raw_parts_mut(ptr as *mut u8, len as usize);
        drop(Box::from_raw(raw as *mut [u8]));
    }
}

#[export_name = "validate"]
pub extern "C" fn validate_export(ptr: i32, len: i32) -> i64 {
    call(ptr, len, |input| crate::validate(input, &HostLogger))
}

#[export_name = "validate_settings"]
pub extern "C" fn validate_settings_export(ptr: i32, len: i32) -> i64 {
    call(ptr, len, crate::validate_settings)
}

fn call(ptr: i32, len: i32, entry: impl FnOnce(&[u8]) -> PolicyResult<Vec<u8>>) -> i64 {
    if ptr <= 0 || len < 0 {
        return 0;
    }
    let input = unsafe { slice::from_raw_parts(ptr as *const u8, len as usize) };

    match entry(input) {
        Ok(output) => {
            let out_len = output.len() as i64;
            let out_ptr = Box::into_raw(output.into_boxed_slice()) as *mut u8 as i64;
            (out_ptr << 32) | out_len
        }
        Err(e) => {
            HostLogger.error(&e.to_string());
            0
        }
    }
}
