use beep::beep;
use std::error::Error;

/// The buzzer. The driver keeps it going while the sound timer is non-zero.
pub trait Sound {
    fn beep(&mut self) -> Result<(), Box<dyn Error>>;
    fn stop(&mut self) -> Result<(), Box<dyn Error>>;
    fn is_beeping(&self) -> bool;

    /// start or stop only when the state actually changes
    fn set_tone(&mut self, on: bool) -> Result<(), Box<dyn Error>> {
        match (on, self.is_beeping()) {
            (true, false) => self.beep(),
            (false, true) => self.stop(),
            _ => Ok(()),
        }
    }
}

const SIMPLEBEEP_PITCH: u16 = 2093; // C

/// PC speaker beep through the `beep` crate
pub struct SimpleBeep {
    is_beeping: bool,
}

impl Default for SimpleBeep {
    fn default() -> Self {
        Self::new()
    }
}

impl SimpleBeep {
    pub fn new() -> Self {
        SimpleBeep { is_beeping: false }
    }
}

impl Sound for SimpleBeep {
    fn beep(&mut self) -> Result<(), Box<dyn Error>> {
        beep(SIMPLEBEEP_PITCH)?;
        self.is_beeping = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn Error>> {
        beep(0)?;
        self.is_beeping = false;
        Ok(())
    }

    fn is_beeping(&self) -> bool {
        self.is_beeping
    }
}

/// tracks the tone without making any noise
#[derive(Debug, Default)]
pub struct Mute {
    is_beeping: bool,
    starts: usize,
}

impl Mute {
    pub fn new() -> Self {
        Self::default()
    }

    /// how many times the tone was started
    pub fn starts(&self) -> usize {
        self.starts
    }
}

impl Sound for Mute {
    fn beep(&mut self) -> Result<(), Box<dyn Error>> {
        self.is_beeping = true;
        self.starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn Error>> {
        self.is_beeping = false;
        Ok(())
    }

    fn is_beeping(&self) -> bool {
        self.is_beeping
    }
}
