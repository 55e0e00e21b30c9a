mod competition_repository;
mod conversion;
mod registration_repository;
mod season_repository;
mod series_repository;

#[cfg(test)]
mod fixtures;

pub use competition_repository::CompetitionRepository;
pub use conversion::{DBFromConversionError, DBToConversionError};
pub use registration_repository::RegistrationRepository;
pub use season_repository::SeasonRepository;
pub use series_repository::{SeriesRepository, SeriesSaveError};
