pub use anyhow::{
    anyhow,
    bail,
    ensure,
};
pub use paste::paste;
pub use regex::{
    Regex,
    RegexBuilder,
};
pub use thiserror::Error;

pub type EmptyResult = anyhow::Result<()>;

// Frames whose location contains one of these are toolchain/runtime noise
pub const BUILD_DIR: &str = "/.build/";
pub const CARGO_REGISTRY_DIR: &str = "/.cargo/registry/";
pub const RUSTC_DIR: &str = "/rustc/";
pub const GLIBC: &str = "glibc";

// This macro creates an enum which derives from thiserror::Error, and also
// creates constructor functions in snake case for each of the enum variants
#[macro_export]
macro_rules! err_impl {
    (@hidden $errtype:ident, $item:ident, String) => {
        paste! {
            pub(crate) fn [<$item:snake>](in_: &str) -> anyhow::Error {
                anyhow!{$errtype::$item(in_.into())}
            }
        }
    };

    (@hidden $errtype:ident, $item:ident, $($dtype:tt)::+) => {
        paste! {
            pub(crate) fn [<$item:snake>](in_: &$($dtype)::+) -> anyhow::Error {
                anyhow!{$errtype::$item(in_.clone())}
            }
        }
    };

    ($errtype:ident,
        $(#[$errinfo:meta] $item:ident($($dtype:tt)::+),)+
    ) => {
        #[derive(Debug, Error)]
        pub(crate) enum $errtype {
            $(#[$errinfo] $item($($dtype)::+)),+
        }

        impl $errtype {
            $(err_impl! {@hidden $errtype, $item, $($dtype)::+})+
        }
    };
}

// Logs an anyhow::Error along with a trimmed-down backtrace.  The async runtime and the kube
// client stack add dozens of frames to every backtrace; we only keep the frames that point at our
// own code and collapse everything else into a "skipped N frames" marker.
//
// Capturing and filtering the backtrace is not cheap; this should only be used on paths that
// are already exceptional (pipeline start failures, fatal watch errors).
#[macro_export]
macro_rules! kcerr {
    (@hidden $err:ident, $msg:literal, $($args:expr),*) => {
        let bt = $err.backtrace().to_string();
        let re = RegexBuilder::new(r"^\s+\d+(?s:.*?)(\s+at\s+.*:\d+)$")
            .multi_line(true)
            .build()
            .unwrap();
        let mut skipped_frames = 0;
        let mut filtered_bt = re.find_iter(&bt).fold(String::new(), |mut acc, frame| {
            let frame = frame.as_str();
            if frame.contains(BUILD_DIR)
                || frame.contains(CARGO_REGISTRY_DIR)
                || frame.contains(RUSTC_DIR)
                || frame.contains(GLIBC)
            {
                skipped_frames += 1;
            } else if !frame.is_empty() {
                if skipped_frames > 0 {
                    acc += &format!("      -- <skipped {skipped_frames} frame(s)> --\n");
                }
                acc += &format!("{frame}\n");
                skipped_frames = 0;
            }
            acc
        });

        if skipped_frames > 0 {
            filtered_bt += &format!("      -- <skipped {skipped_frames} frame(s)> --");
        }
        error!(concat!($msg, "\n\n{}\n\nPartial Stack Trace:\n\n{}\n\n") $(, $args)*, $err, filtered_bt);
    };

    ($err:ident, $msg:literal) => {
        kcerr! {@hidden $err, $msg, };
    };

    ($err:ident, $msg:literal, $($args:expr),*) => {
        kcerr! {@hidden $err, $msg, $($args),*};
    };
}

pub use {
    err_impl,
    kcerr,
};
