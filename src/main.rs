fn main() {
    if let Err(err) = presence_timer_lib::run() {
        eprintln!("presence-timer: {err:#}");
        std::process::exit(1);
    }
}
