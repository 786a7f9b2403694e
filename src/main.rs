//! `blueprint` binary. All logic lives in the library; this only maps the
//! outcome of `cli::run()` to the process exit status.

fn main() {
    if let Err(code) = blueprint::cli::run() {
        std::process::exit(code.as_i32());
    }
}
