// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared declarative macros.

/// `Display` for a fieldless enum from a variant-to-literal table. The
/// literals double as the serde names, so keep the two in step.
///
/// ```ignore
/// lk_core::simple_display! {
///     Stage {
///         Idle => "idle",
///         CleaningUp => "cleaning_up",
///     }
/// }
/// ```
#[macro_export]
macro_rules! simple_display {
    ($enum:ty { $( $variant:ident => $text:literal ),+ $(,)? }) => {
        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(match self {
                    $( Self::$variant => $text, )+
                })
            }
        }
    };
}
