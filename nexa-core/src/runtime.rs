//! Executes wasm artifacts produced by [`crate::codegen_wasm`] with
//! `wasmi`, supplying the `env.printf` import.

use wasmi::{Caller, Engine, Extern, Linker, Module, Store};

use crate::codegen_wasm::{IMPORT_MODULE, MEMORY_EXPORT};
use crate::error::CoreError;

/// Outcome of running a program's `main`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub exit_code: i32,
    pub stdout: String,
}

#[derive(Debug, Default)]
struct HostState {
    stdout: String,
    /// First failure inside a host call; reported after `main` returns.
    error: Option<String>,
}

fn runtime_error(context: &str, err: impl std::fmt::Display) -> CoreError {
    CoreError::RuntimeError(format!("{context}: {err}"))
}

/// Instantiate `wasm`, call its exported `main`, and collect what it
/// printed.
#[tracing::instrument(level = "debug", skip_all, fields(bytes = wasm.len()))]
pub fn run_wasm(wasm: &[u8]) -> Result<Execution, CoreError> {
    let engine = Engine::default();
    let module = Module::new(&engine, wasm).map_err(|err| runtime_error("invalid module", err))?;

    let mut linker = <Linker<HostState>>::new(&engine);
    linker
        .func_wrap(
            IMPORT_MODULE,
            "printf",
            |mut caller: Caller<'_, HostState>, format: i32, args: i32| -> i32 {
                let Some(memory) = caller
                    .get_export(MEMORY_EXPORT)
                    .and_then(Extern::into_memory)
                else {
                    caller
                        .data_mut()
                        .error
                        .get_or_insert_with(|| "module does not export memory".to_string());
                    return -1;
                };
                let formatted = format_printf(memory.data(&caller), format as u32, args as u32);
                let state = caller.data_mut();
                match formatted {
                    Ok(text) => {
                        state.stdout.push_str(&text);
                        text.len() as i32
                    }
                    Err(message) => {
                        state.error.get_or_insert(message);
                        -1
                    }
                }
            },
        )
        .map_err(|err| runtime_error("failed to link printf", err))?;

    let mut store = Store::new(&engine, HostState::default());
    let instance = linker
        .instantiate_and_start(&mut store, &module)
        .map_err(|err| runtime_error("failed to instantiate module", err))?;
    let main = instance
        .get_typed_func::<(), i32>(&store, "main")
        .map_err(|err| runtime_error("exported main function missing or has wrong type", err))?;
    let outcome = main.call(&mut store, ());

    let state = store.into_data();
    if let Some(message) = state.error {
        return Err(CoreError::RuntimeError(message));
    }
    let exit_code = outcome.map_err(|err| runtime_error("execution trapped", err))?;
    tracing::debug!(exit_code, output = state.stdout.len(), "program finished");
    Ok(Execution {
        exit_code,
        stdout: state.stdout,
    })
}

fn read_bytes<const N: usize>(memory: &[u8], address: u32) -> Result<[u8; N], String> {
    let start = address as usize;
    memory
        .get(start..start + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| format!("read of {N} bytes at {address} is out of bounds"))
}

fn read_c_string(memory: &[u8], address: u32) -> Result<&[u8], String> {
    let tail = memory
        .get(address as usize..)
        .ok_or_else(|| format!("string at {address} is out of bounds"))?;
    let len = tail
        .iter()
        .position(|&byte| byte == 0)
        .ok_or_else(|| format!("string at {address} is not terminated"))?;
    Ok(&tail[..len])
}

/// Render a C format string whose arguments sit in consecutive 8-byte
/// slots starting at `args`.
///
/// Supports `%d`, `%lld`, `%f`, `%c`, `%s` and `%%`.
pub fn format_printf(memory: &[u8], format: u32, args: u32) -> Result<String, String> {
    let format = read_c_string(memory, format)?;
    let mut out = String::new();
    let mut slot = args;
    let mut bytes = format.iter().copied().peekable();

    while let Some(byte) = bytes.next() {
        if byte != b'%' {
            out.push(char::from(byte));
            continue;
        }
        let mut long = false;
        while bytes.next_if_eq(&b'l').is_some() {
            long = true;
        }
        let conversion = bytes
            .next()
            .ok_or_else(|| "format string ends with `%`".to_string())?;
        match conversion {
            b'%' => {
                out.push('%');
                continue;
            }
            b'd' | b'i' if long => {
                out.push_str(&i64::from_le_bytes(read_bytes(memory, slot)?).to_string());
            }
            b'd' | b'i' => {
                out.push_str(&i32::from_le_bytes(read_bytes(memory, slot)?).to_string());
            }
            b'f' => {
                let value = f64::from_le_bytes(read_bytes(memory, slot)?);
                out.push_str(&format!("{value:.6}"));
            }
            b'c' => {
                let value = i32::from_le_bytes(read_bytes(memory, slot)?);
                out.push(char::from(value as u8));
            }
            b's' => {
                let address = u32::from_le_bytes(read_bytes(memory, slot)?);
                out.push_str(&String::from_utf8_lossy(read_c_string(memory, address)?));
            }
            other => {
                return Err(format!(
                    "unsupported printf conversion `%{}`",
                    char::from(other)
                ));
            }
        }
        slot += 8;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Memory {
        bytes: Vec<u8>,
    }

    impl Memory {
        fn new() -> Self {
            Memory {
                bytes: vec![0; 256],
            }
        }

        fn put(&mut self, address: usize, data: &[u8]) {
            self.bytes[address..address + data.len()].copy_from_slice(data);
        }
    }

    #[test]
    fn formats_each_conversion() {
        let mut memory = Memory::new();
        memory.put(0, b"%d|%lld|%f|%c|%s|100%%\n\0");
        memory.put(64, &(-7i32).to_le_bytes());
        memory.put(72, &3_000_000_000i64.to_le_bytes());
        memory.put(80, &3.5f64.to_le_bytes());
        memory.put(88, &i32::from(b'x').to_le_bytes());
        memory.put(96, &200u32.to_le_bytes());
        memory.put(200, b"hi\0");

        let text = format_printf(&memory.bytes, 0, 64).expect("format");
        assert_eq!(text, "-7|3000000000|3.500000|x|hi|100%\n");
    }

    #[test]
    fn rejects_unterminated_and_unknown_formats() {
        let mut memory = Memory::new();
        memory.put(0, b"%q\0");
        assert!(format_printf(&memory.bytes, 0, 64).is_err());

        let unterminated = vec![b'a'; 16];
        assert!(format_printf(&unterminated, 0, 0).is_err());
    }

    #[test]
    fn rejects_out_of_bounds_arguments() {
        let mut memory = Memory::new();
        memory.put(0, b"%d\0");
        assert!(format_printf(&memory.bytes, 0, 254).is_err());
    }

    #[test]
    fn reports_invalid_modules() {
        let err = run_wasm(b"not wasm").unwrap_err();
        assert!(matches!(err, CoreError::RuntimeError(_)));
    }
}
