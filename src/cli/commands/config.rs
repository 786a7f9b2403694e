use crate::Config;

/// `blueprint config show`
pub(crate) fn show(config: &Config) {
    match &config.config_path {
        Some(path) => println!("# config file: {}", path.display()),
        None => println!("# no config file found; using defaults"),
    }
    for (key, (value, source)) in config.effective_config() {
        println!("{key} = {value:?}  # {source}");
    }
}
