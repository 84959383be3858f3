use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub city: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub program: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speaker {
    pub name: String,
    #[serde(default)]
    pub courses: Vec<Course>,
}

/// Speakers and the courses they run, ordered by speaker name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Catalog {
    speakers: Vec<Speaker>,
}

impl Catalog {
    pub fn new(mut speakers: Vec<Speaker>) -> Self {
        speakers.sort_by(|left, right| left.name.cmp(&right.name));
        Self { speakers }
    }

    pub fn speakers(&self) -> &[Speaker] {
        &self.speakers
    }

    pub fn speaker(&self, index: usize) -> Option<&Speaker> {
        self.speakers.get(index)
    }

    pub fn course(&self, speaker_index: usize, course_index: usize) -> Option<(&Speaker, &Course)> {
        let speaker = self.speaker(speaker_index)?;
        speaker.courses.get(course_index).map(|course| (speaker, course))
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Catalog, Course, Speaker};

    fn speaker(name: &str, cities: &[&str]) -> Speaker {
        Speaker {
            name: name.to_owned(),
            courses: cities
                .iter()
                .map(|city| Course { city: (*city).to_owned(), ..Course::default() })
                .collect(),
        }
    }

    #[test]
    fn speakers_are_sorted_by_name() {
        let catalog = Catalog::new(vec![speaker("Zoya", &[]), speaker("Alex", &[])]);
        let names: Vec<&str> = catalog.speakers().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Alex", "Zoya"]);
    }

    #[test]
    fn course_lookup_resolves_pairs_and_rejects_out_of_range() {
        let catalog = Catalog::new(vec![speaker("Alex", &["Moscow", "Kazan"])]);

        let (found_speaker, course) = catalog.course(0, 1).expect("course should exist");
        assert_eq!(found_speaker.name, "Alex");
        assert_eq!(course.city, "Kazan");

        assert!(catalog.course(0, 2).is_none());
        assert!(catalog.course(1, 0).is_none());
    }
}
