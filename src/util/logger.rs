use log::SetLoggerError;

/// Attempt to init a env_logger for the inspector.
/// Does nothing if the "builtin_env_logger" feature is disabled.
///
/// Hosts that install their own `log` implementation should not call this.
pub fn try_init() -> Result<(), SetLoggerError> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "builtin_env_logger")] {
            env_logger::try_init_from_env(
                // By default, use info level logging.
                env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
            )
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        // Only one logger may be installed per process. The first call may win or lose against
        // other tests, but neither call panics.
        let _ = try_init();
        let _ = try_init();
        info!("logger initialized");
    }
}
