use serde::Deserialize;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FeeError {
    #[error("unsupported fee tier {0}")]
    Unsupported(u32),
}

/// Fee tiers a pool factory will deploy, in hundredths of a bip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "u32")]
#[repr(u32)]
pub enum FeeAmount {
    Lowest = 100,
    Low = 500,
    Medium = 3000,
    High = 10000,
}

impl FeeAmount {
    pub const ALL: [FeeAmount; 4] = [
        FeeAmount::Lowest,
        FeeAmount::Low,
        FeeAmount::Medium,
        FeeAmount::High,
    ];

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Tick spacing the factory enables for this tier.
    pub fn tick_spacing(self) -> i32 {
        match self {
            FeeAmount::Lowest => 1,
            FeeAmount::Low => 10,
            FeeAmount::Medium => 60,
            FeeAmount::High => 200,
        }
    }
}

impl TryFrom<u32> for FeeAmount {
    type Error = FeeError;

    fn try_from(fee: u32) -> Result<Self, Self::Error> {
        FeeAmount::ALL
            .into_iter()
            .find(|tier| tier.as_u32() == fee)
            .ok_or(FeeError::Unsupported(fee))
    }
}

impl std::fmt::Display for FeeAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}
