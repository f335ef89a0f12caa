use std::{cell::RefCell, ffi::OsStr};

#[derive(Clone, Copy)]
struct Env {
    quiet: bool,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

pub fn init() {
    let value = Env {
        quiet: var_is("RELASM_QUIET", "1"),
    };
    set_env(value);
}

/// Status messages are suppressed. Diagnostics are always printed.
pub fn is_quiet() -> bool {
    with_env(|env| env.quiet)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_exact_value() {
        std::env::set_var("RELASM_ENV_TEST", "1");
        assert!(var_is("RELASM_ENV_TEST", "1"));
        assert!(!var_is("RELASM_ENV_TEST", "true"));
        assert!(!var_is("RELASM_ENV_TEST_UNSET", "1"));
    }
}
