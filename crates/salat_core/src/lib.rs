pub mod domain;
pub mod heading;
pub mod ports;
pub mod qibla;
pub mod schedule;
pub mod timezone;

pub use domain::{
    CalculationMethod, CalculationSettings, DailyPrayerTimes, DedupKey, HighLatitudeRule,
    Location, Madhab, NotificationPreferences, NotificationStage, Prayer, PrayerOccurrence,
    Subscriber, UnknownVariant, UserId,
};
pub use heading::{FilterOutcome, HeadingError, HeadingFilter, HeadingFilterConfig, OrientationSample};
pub use ports::{
    DedupLedger, MessageTransport, PortError, PortResult, PrayerTimeCalculator, ReplyButton,
    SendOptions, SubscriberRepository, TimezoneResolver,
};
pub use timezone::StaticTimezoneResolver;
