use metadata::{GenreCodec, MetadataError};

use common::Outcome;

use crate::config::GenreMatch;
use crate::genre::GenreLabel;
use crate::scan::AudioFile;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Update {
        current: Option<String>,
        target: GenreLabel,
    },
    Skip {
        outcome: Outcome,
        current: Option<String>,
    },
}

pub fn decide(
    file: &AudioFile,
    target: Option<&GenreLabel>,
    codec: &dyn GenreCodec,
    matching: GenreMatch,
) -> Result<Decision, MetadataError> {
    let Some(target) = target else {
        return Ok(Decision::Skip {
            outcome: Outcome::SkippedFilteredOut,
            current: None,
        });
    };

    let current = codec.read_genre(&file.path)?;
    if matching.is_satisfied(current.as_deref(), target.as_str()) {
        return Ok(Decision::Skip {
            outcome: Outcome::SkippedAlreadyCorrect,
            current,
        });
    }

    Ok(Decision::Update {
        current,
        target: target.clone(),
    })
}
