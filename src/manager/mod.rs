pub mod app_config;
pub mod diff;
pub mod filter;
pub mod notifications;
pub mod output_grammar;
pub mod profile;
pub mod report;
pub mod restic;
pub mod result_error;
pub mod run;
pub mod secret;
pub mod sequencer;
pub mod session;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
