use std::{collections::HashMap, time::Instant};

#[derive(Clone)]
pub struct Logger {
    /// 10 is everything and 0 is nothing
    level: u8,
    start_times: HashMap<String, Instant>,
}

impl Logger {
    pub fn new(level: u8) -> Self {
        Logger {
            level,
            start_times: HashMap::new(),
        }
    }

    pub fn log(&self, level: u8, msg: &str) {
        if level <= self.level {
            println!("{}", msg);
        }
    }

    pub fn log_lazy(&self, level: u8, msg: impl FnOnce() -> String) {
        if level <= self.level {
            self.log(level, &msg());
        }
    }

    pub fn time_start(&mut self, _level: u8, name: &str) {
        self.start_times.insert(name.to_string(), Instant::now());
    }

    pub fn time_end(&mut self, level: u8, name: &str) {
        if let Some(start) = self.start_times.remove(name) {
            let elapsed = start.elapsed();
            self.log(
                level,
                &format!(
                    "{}: {}.{:03}",
                    name,
                    elapsed.as_secs(),
                    elapsed.subsec_millis()
                ),
            );
        } else {
            panic!("end_time called for non-existing timing string")
        }
    }
}
