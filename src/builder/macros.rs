//! Macros for declaring state domains.

/// Declare a fieldless enum and implement [`State`](crate::core::State) for it.
///
/// The generated `variants()` lists the variants in declaration order,
/// which is the order auto-registration binds their nodes in.
///
/// # Example
///
/// ```
/// use stagehand::core::State;
/// use stagehand::state_enum;
///
/// state_enum! {
///     pub enum SceneState {
///         Loading,
///         Playing,
///         Paused,
///     }
/// }
///
/// assert_eq!(SceneState::Playing.name(), "Playing");
/// assert_eq!(SceneState::variants().len(), 3);
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::State for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }

            fn variants() -> Vec<Self> {
                vec![$(Self::$variant),*]
            }
        }
    };
}
