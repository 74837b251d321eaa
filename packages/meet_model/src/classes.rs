//! Weight and age classes and the rule that places a lifter in one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MeetError;
use crate::lifter::Gender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeightClassGender {
    Male,
    Female,
    Both,
}

impl WeightClassGender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Both => "Both",
        }
    }

    pub fn admits(&self, gender: Gender) -> bool {
        match (self, gender) {
            (Self::Both, _) => true,
            (Self::Male, Gender::Male) | (Self::Female, Gender::Female) => true,
            _ => false,
        }
    }
}

impl fmt::Display for WeightClassGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeightClassGender {
    type Err = MeetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Self::Male),
            "Female" => Ok(Self::Female),
            "Both" => Ok(Self::Both),
            other => Err(MeetError::invalid(
                "gender",
                format!("unknown class gender {other:?}"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightClass {
    pub id: i64,
    pub name: String,
    pub min_weight: f64,
    /// `None` for an open (plus) class.
    pub max_weight: Option<f64>,
    pub gender: WeightClassGender,
}

impl WeightClass {
    pub fn contains(&self, weight: f64, gender: Gender) -> bool {
        self.gender.admits(gender)
            && self.min_weight <= weight
            && self.max_weight.is_none_or(|max| weight <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWeightClass {
    pub name: String,
    pub min_weight: f64,
    #[serde(default)]
    pub max_weight: Option<f64>,
    pub gender: WeightClassGender,
}

impl NewWeightClass {
    pub fn validate(&self) -> Result<(), MeetError> {
        if self.name.trim().is_empty() {
            return Err(MeetError::invalid("name", "must not be empty"));
        }
        if !(self.min_weight.is_finite() && self.min_weight >= 0.0) {
            return Err(MeetError::invalid("min_weight", "must be zero or more"));
        }
        if let Some(max) = self.max_weight {
            if !max.is_finite() || max < self.min_weight {
                return Err(MeetError::invalid("max_weight", "must not be below min_weight"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeClass {
    pub id: i64,
    pub name: String,
    pub min_age: u32,
    /// `None` for an open-ended class.
    pub max_age: Option<u32>,
}

impl AgeClass {
    pub fn contains(&self, age: u32) -> bool {
        self.min_age <= age && self.max_age.is_none_or(|max| age <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAgeClass {
    pub name: String,
    pub min_age: u32,
    #[serde(default)]
    pub max_age: Option<u32>,
}

impl NewAgeClass {
    pub fn validate(&self) -> Result<(), MeetError> {
        if self.name.trim().is_empty() {
            return Err(MeetError::invalid("name", "must not be empty"));
        }
        if let Some(max) = self.max_age {
            if max < self.min_age {
                return Err(MeetError::invalid("max_age", "must not be below min_age"));
            }
        }
        Ok(())
    }
}

/// The class with the lowest lower bound that admits this body weight.
pub fn primary_weight_class(
    classes: &[WeightClass],
    weight: f64,
    gender: Gender,
) -> Option<&WeightClass> {
    classes
        .iter()
        .filter(|c| c.contains(weight, gender))
        .min_by(|a, b| a.min_weight.total_cmp(&b.min_weight).then(a.id.cmp(&b.id)))
}

/// The class with the lowest lower bound that admits this age.
pub fn primary_age_class(classes: &[AgeClass], age: u32) -> Option<&AgeClass> {
    classes
        .iter()
        .filter(|c| c.contains(age))
        .min_by(|a, b| a.min_age.cmp(&b.min_age).then(a.id.cmp(&b.id)))
}

/// Weight classes loaded into an empty database.
pub fn default_weight_classes() -> Vec<NewWeightClass> {
    let men: [(&str, f64, Option<f64>); 8] = [
        ("Men's 59kg", 0.0, Some(59.0)),
        ("Men's 66kg", 59.01, Some(66.0)),
        ("Men's 74kg", 66.01, Some(74.0)),
        ("Men's 83kg", 74.01, Some(83.0)),
        ("Men's 93kg", 83.01, Some(93.0)),
        ("Men's 105kg", 93.01, Some(105.0)),
        ("Men's 120kg", 105.01, Some(120.0)),
        ("Men's 120+kg", 120.01, None),
    ];
    let women: [(&str, f64, Option<f64>); 8] = [
        ("Women's 47kg", 0.0, Some(47.0)),
        ("Women's 52kg", 47.01, Some(52.0)),
        ("Women's 57kg", 52.01, Some(57.0)),
        ("Women's 63kg", 57.01, Some(63.0)),
        ("Women's 69kg", 63.01, Some(69.0)),
        ("Women's 76kg", 69.01, Some(76.0)),
        ("Women's 84kg", 76.01, Some(84.0)),
        ("Women's 84+kg", 84.01, None),
    ];

    men.into_iter()
        .map(|row| (row, WeightClassGender::Male))
        .chain(women.into_iter().map(|row| (row, WeightClassGender::Female)))
        .map(|((name, min_weight, max_weight), gender)| NewWeightClass {
            name: name.to_string(),
            min_weight,
            max_weight,
            gender,
        })
        .collect()
}

/// Age classes loaded into an empty database.
pub fn default_age_classes() -> Vec<NewAgeClass> {
    [
        ("Sub-Junior", 14, Some(18)),
        ("Junior", 19, Some(23)),
        ("Open", 24, Some(39)),
        ("Master I", 40, Some(49)),
        ("Master II", 50, Some(59)),
        ("Master III", 60, Some(69)),
        ("Master IV", 70, None),
    ]
    .into_iter()
    .map(|(name, min_age, max_age)| NewAgeClass {
        name: name.to_string(),
        min_age,
        max_age,
    })
    .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn seeded_weight_classes() -> Vec<WeightClass> {
        default_weight_classes()
            .into_iter()
            .enumerate()
            .map(|(i, c)| WeightClass {
                id: i as i64 + 1,
                name: c.name,
                min_weight: c.min_weight,
                max_weight: c.max_weight,
                gender: c.gender,
            })
            .collect()
    }

    pub(crate) fn seeded_age_classes() -> Vec<AgeClass> {
        default_age_classes()
            .into_iter()
            .enumerate()
            .map(|(i, c)| AgeClass {
                id: i as i64 + 1,
                name: c.name,
                min_age: c.min_age,
                max_age: c.max_age,
            })
            .collect()
    }

    #[test]
    fn weight_class_respects_gender() {
        let classes = seeded_weight_classes();
        let men = primary_weight_class(&classes, 82.5, Gender::Male).unwrap();
        assert_eq!(men.name, "Men's 83kg");
        let women = primary_weight_class(&classes, 82.5, Gender::Female).unwrap();
        assert_eq!(women.name, "Women's 84kg");
    }

    #[test]
    fn open_class_has_no_upper_bound() {
        let classes = seeded_weight_classes();
        let c = primary_weight_class(&classes, 180.0, Gender::Male).unwrap();
        assert_eq!(c.name, "Men's 120+kg");
    }

    #[test]
    fn boundary_weight_goes_to_lighter_class() {
        let classes = seeded_weight_classes();
        let c = primary_weight_class(&classes, 66.0, Gender::Male).unwrap();
        assert_eq!(c.name, "Men's 66kg");
    }

    #[test]
    fn both_gender_class_admits_everyone() {
        let classes = vec![WeightClass {
            id: 1,
            name: "Open".into(),
            min_weight: 0.0,
            max_weight: None,
            gender: WeightClassGender::Both,
        }];
        assert!(primary_weight_class(&classes, 70.0, Gender::Female).is_some());
        assert!(primary_weight_class(&classes, 70.0, Gender::Male).is_some());
    }

    #[test]
    fn overlapping_classes_pick_lowest_min() {
        let classes = vec![
            WeightClass {
                id: 1,
                name: "Heavy".into(),
                min_weight: 80.0,
                max_weight: None,
                gender: WeightClassGender::Both,
            },
            WeightClass {
                id: 2,
                name: "Light".into(),
                min_weight: 0.0,
                max_weight: Some(100.0),
                gender: WeightClassGender::Both,
            },
        ];
        let c = primary_weight_class(&classes, 90.0, Gender::Male).unwrap();
        assert_eq!(c.name, "Light");
    }

    #[test]
    fn age_classes() {
        let classes = seeded_age_classes();
        assert_eq!(primary_age_class(&classes, 16).unwrap().name, "Sub-Junior");
        assert_eq!(primary_age_class(&classes, 23).unwrap().name, "Junior");
        assert_eq!(primary_age_class(&classes, 45).unwrap().name, "Master I");
        assert_eq!(primary_age_class(&classes, 91).unwrap().name, "Master IV");
        assert!(primary_age_class(&classes, 12).is_none());
    }

    #[test]
    fn seed_sets_are_complete() {
        assert_eq!(default_weight_classes().len(), 16);
        assert_eq!(default_age_classes().len(), 7);
        for c in default_weight_classes() {
            c.validate().unwrap();
        }
        for c in default_age_classes() {
            c.validate().unwrap();
        }
    }

    #[test]
    fn new_class_validation() {
        let bad = NewWeightClass {
            name: "Inverted".into(),
            min_weight: 90.0,
            max_weight: Some(80.0),
            gender: WeightClassGender::Male,
        };
        assert!(matches!(
            bad.validate(),
            Err(MeetError::Invalid { field: "max_weight", .. })
        ));

        let bad = NewAgeClass {
            name: "".into(),
            min_age: 10,
            max_age: None,
        };
        assert!(matches!(bad.validate(), Err(MeetError::Invalid { field: "name", .. })));
    }
}
