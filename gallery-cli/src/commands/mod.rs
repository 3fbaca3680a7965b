pub mod extract_colors;
pub mod extract_exif;
pub mod import;
pub mod list;
pub mod regenerate;
pub mod themes;

use indicatif::{ProgressBar, ProgressStyle};

pub(crate) fn progress_bar(len: usize, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .expect("Invalid progress bar template")
            .progress_chars("█▓▒░ "),
    );
    pb.set_message(message);
    pb
}
