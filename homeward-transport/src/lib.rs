mod api;
mod server;

pub use api::HttpTrackApi;
pub use server::{API_BASE_URL, track_subject_path};
