fn main() {
    if let Err(err) = wennerviz_lib::run() {
        eprintln!("wennerviz: {err:#}");
        std::process::exit(1);
    }
}
