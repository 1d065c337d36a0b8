// Adapter backends

pub mod ytdlp;

pub use ytdlp::YtDlpAdapter;
