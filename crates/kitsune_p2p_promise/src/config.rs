//! Kitsune Promise Tuning Params
#![allow(missing_docs)]

/// Default reserved name prefix of transport io threads.
pub const DEFAULT_IO_THREAD_NAME_PREFIX: &str = "kitsune-io";

/// Wrapper for the actual PromiseTuningParams struct
/// so the widely used type def can be an Arc<>
pub mod tuning_params_struct {
    use std::collections::HashMap;

    macro_rules! mk_tune {
        ($($(#[doc = $doc:expr])* $i:ident: $t:ty = $d:expr,)*) => {
            /// Promise tuning parameters.
            /// This is serialized carefully so all the values can be represented
            /// as strings in YAML - and we will be able to proceed with a printed
            /// warning for tuning params that are removed, but still specified in
            /// configs.
            #[non_exhaustive]
            #[derive(Clone, Debug, PartialEq)]
            pub struct PromiseTuningParams {
                $(
                    $(#[doc = $doc])*
                    pub $i: $t,
                )*
            }

            impl Default for PromiseTuningParams {
                fn default() -> Self {
                    Self {
                        $(
                            $i: $d,
                        )*
                    }
                }
            }

            impl serde::Serialize for PromiseTuningParams {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: serde::Serializer,
                {
                    use serde::ser::SerializeMap;
                    let mut m = serializer.serialize_map(None)?;
                    $(
                        m.serialize_entry(
                            stringify!($i),
                            &format!("{}", &self.$i),
                        )?;
                    )*
                    m.end()
                }
            }

            impl<'de> serde::Deserialize<'de> for PromiseTuningParams {
                fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                where
                    D: serde::Deserializer<'de>,
                {
                    let result = <HashMap<String, String>>::deserialize(deserializer)?;
                    let mut out = PromiseTuningParams::default();
                    for (k, v) in result.into_iter() {
                        match k.as_str() {
                            $(
                                stringify!($i) => match v.parse::<$t>() {
                                    Ok(v) => out.$i = v,
                                    Err(e) => tracing::warn!("failed to parse {}: {}", k, e),
                                },
                            )*
                            _ => tracing::warn!("INVALID TUNING PARAM: '{}'", k),
                        }
                    }
                    Ok(out)
                }
            }
        };
    }

    mk_tune! {
        /// Threads whose name starts with this prefix belong to the
        /// transport io event loop and are refused by
        /// [`crate::IoThreadGuard`]. [Default: "kitsune-io"]
        io_thread_name_prefix: String = super::DEFAULT_IO_THREAD_NAME_PREFIX.to_string(),

        /// Default timeout applied by [`crate::fail_on_timeout_default`]
        /// to rpc response futures. [Default: 60s]
        default_rpc_timeout_ms: u64 = 1000 * 60,
    }

    impl PromiseTuningParams {
        /// Get the default rpc timeout as a Duration.
        pub fn default_rpc_timeout(&self) -> std::time::Duration {
            std::time::Duration::from_millis(self.default_rpc_timeout_ms)
        }
    }
}

/// We don't want to clone these every time we pass them around.
pub type PromiseTuningParams = std::sync::Arc<tuning_params_struct::PromiseTuningParams>;
