//! Class maps and the typed row reader built on them.
//!
//! A [`ClassMap`] is the configuration of one record type: an auto-mapped
//! tree the caller adjusts through path expressions. An [`Importer`] owns
//! the registered class maps and reads typed rows from sheets. Types read
//! without a registration are auto-mapped on first use. Configuration and
//! reading are two strictly sequential phases: once the first row has been
//! read, the importer rejects further configuration.

use std::{
    any::TypeId,
    collections::{HashMap, hash_map::Entry},
    marker::PhantomData,
};

use log::debug;

use crate::{
    auto::AutoMapper,
    convert::{FromValue, SheetRecord},
    error::{CellError, ConfigError, Result},
    map::{CellFailure, Map, ObjectMap},
    path::{MapPath, locate_or_create},
    sheet::SheetReader,
    shape::{Shape, short_type_name},
    source::RowSource,
    value::Value,
};

/// Map tree for record type `T`.
#[derive(Debug, Clone)]
pub struct ClassMap<T> {
    root: Map,
    auto: AutoMapper,
    _target: PhantomData<fn() -> T>,
}

impl<T: FromValue> ClassMap<T> {
    /// Auto-maps every field of `T` with the default auto-mapper.
    pub fn new() -> std::result::Result<Self, ConfigError> {
        Self::with_mapper(AutoMapper::default())
    }

    pub fn with_mapper(auto: AutoMapper) -> std::result::Result<Self, ConfigError> {
        let root = auto.map_type::<T>()?;
        Ok(Self {
            root,
            auto,
            _target: PhantomData,
        })
    }

    /// Starts without any member maps; only the paths configured through
    /// [`map`](Self::map) are read. Non-record types are auto-mapped.
    pub fn empty(auto: AutoMapper) -> std::result::Result<Self, ConfigError> {
        let root = match T::shape() {
            Shape::Object(shape) => Map::Object(ObjectMap::new(shape)),
            other => auto.map_root(&other)?,
        };
        Ok(Self {
            root,
            auto,
            _target: PhantomData,
        })
    }

    /// Returns the node addressed by `path`, e.g. `"address.city"` or
    /// `"scores[2]"`, replacing any earlier configuration of that node.
    pub fn map(&mut self, path: &str) -> std::result::Result<&mut Map, ConfigError> {
        let path = MapPath::parse(path)?;
        self.map_path(&path)
    }

    pub fn map_path(&mut self, path: &MapPath) -> std::result::Result<&mut Map, ConfigError> {
        locate_or_create(&mut self.root, path, &self.auto)
    }

    /// Stops reading a member of the root record.
    pub fn ignore(&mut self, field: &str) -> std::result::Result<&mut Self, ConfigError> {
        let Map::Object(object) = &mut self.root else {
            return Err(ConfigError::Unsupported {
                operation: format!("ignore field '{field}'"),
                target: format!("non-record type '{}'", self.root.type_name()),
            });
        };
        if object.shape().field(field).is_none() {
            return Err(ConfigError::UnknownField {
                type_name: object.shape().type_name.clone(),
                field: field.to_string(),
            });
        }
        object.remove(field);
        Ok(self)
    }

    pub fn root(&self) -> &Map {
        &self.root
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.root.validate()
    }

    pub fn into_map(self) -> Map {
        self.root
    }
}

#[derive(Debug)]
struct Registration {
    type_name: String,
    root: Map,
}

#[derive(Debug, Default)]
pub struct Importer {
    auto: AutoMapper,
    maps: HashMap<TypeId, Registration>,
    frozen: bool,
}

impl Importer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapper(auto: AutoMapper) -> Self {
        Self {
            auto,
            ..Self::default()
        }
    }

    pub fn auto_mapper(&self) -> &AutoMapper {
        &self.auto
    }

    /// Mutable access to the auto-mapper used for unregistered types.
    pub fn auto_mapper_mut(&mut self) -> std::result::Result<&mut AutoMapper, ConfigError> {
        if self.frozen {
            return Err(ConfigError::Frozen {
                type_name: "auto-mapper".to_string(),
            });
        }
        Ok(&mut self.auto)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Registers the class map for `T`. Each type may be registered once,
    /// and only before the first row is read.
    pub fn register<T: FromValue + 'static>(
        &mut self,
        class_map: ClassMap<T>,
    ) -> std::result::Result<(), ConfigError> {
        let type_name = short_type_name::<T>();
        if self.frozen {
            return Err(ConfigError::Frozen { type_name });
        }
        class_map.validate()?;
        match self.maps.entry(TypeId::of::<T>()) {
            Entry::Occupied(_) => Err(ConfigError::DuplicateClassMap { type_name }),
            Entry::Vacant(slot) => {
                debug!("Registered class map for '{type_name}'");
                slot.insert(Registration {
                    type_name,
                    root: class_map.into_map(),
                });
                Ok(())
            }
        }
    }

    pub fn class_map<T: 'static>(&self) -> Option<&Map> {
        self.maps.get(&TypeId::of::<T>()).map(|registration| &registration.root)
    }

    fn root_for<T: FromValue + 'static>(&mut self) -> std::result::Result<&Map, ConfigError> {
        self.frozen = true;
        match self.maps.entry(TypeId::of::<T>()) {
            Entry::Occupied(slot) => Ok(&slot.into_mut().root),
            Entry::Vacant(slot) => {
                let root = self.auto.map_type::<T>()?;
                root.validate()?;
                let type_name = short_type_name::<T>();
                debug!("Auto-mapped unregistered type '{type_name}' on first read");
                Ok(&slot.insert(Registration { type_name, root }).root)
            }
        }
    }

    /// Advances to the next data row and reads it as a `T`; `None` once the
    /// sheet is exhausted.
    pub fn read_row<T, S>(&mut self, sheet: &mut SheetReader<S>) -> Result<Option<T>>
    where
        T: FromValue + 'static,
        S: RowSource,
    {
        let root = self.root_for::<T>()?;
        if !sheet.next_row()? {
            return Ok(None);
        }
        read_current(root, sheet).map(Some)
    }

    /// Advances to the next data row and assigns its mapped fields onto
    /// `target`, leaving unmapped fields untouched. `false` once the sheet is
    /// exhausted.
    pub fn try_read_row<T, S>(&mut self, sheet: &mut SheetReader<S>, target: &mut T) -> Result<bool>
    where
        T: SheetRecord + 'static,
        S: RowSource,
    {
        let root = self.root_for::<T>()?;
        if !sheet.next_row()? {
            return Ok(false);
        }
        let Some(Value::Record(fields)) = sheet.read_value(root)? else {
            return Ok(true);
        };
        for (name, value) in fields {
            target.assign(&name, value).map_err(|err| {
                let err = err.within(name.clone());
                let mut failure = CellFailure::new(CellError::Assignment(err.clone()));
                failure.member = err.path;
                sheet.row_error(failure)
            })?;
        }
        Ok(true)
    }

    pub fn read_all<T, S>(&mut self, sheet: &mut SheetReader<S>) -> Result<Vec<T>>
    where
        T: FromValue + 'static,
        S: RowSource,
    {
        let mut rows = Vec::new();
        while let Some(row) = self.read_row(sheet)? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Reads up to `count` rows starting at data row `start`.
    pub fn read_rows<T, S>(
        &mut self,
        sheet: &mut SheetReader<S>,
        start: usize,
        count: usize,
    ) -> Result<Vec<T>>
    where
        T: FromValue + 'static,
        S: RowSource,
    {
        let mut rows = Vec::with_capacity(count);
        if count == 0 || !sheet.seek(start)? {
            return Ok(rows);
        }
        while rows.len() < count {
            match self.read_row(sheet)? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    /// Type names of the registered class maps, sorted.
    pub fn registered(&self) -> Vec<&str> {
        let mut names = self
            .maps
            .values()
            .map(|registration| registration.type_name.as_str())
            .collect::<Vec<_>>();
        names.sort_unstable();
        names
    }
}

fn read_current<T: FromValue, S: RowSource>(root: &Map, sheet: &mut SheetReader<S>) -> Result<T> {
    let value = sheet.read_value(root)?.unwrap_or(Value::Null);
    T::from_value(value).map_err(|err| {
        let mut failure = CellFailure::new(CellError::Assignment(err.clone()));
        failure.member = err.path;
        sheet.row_error(failure).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{sheet::SheetOptions, source::MemorySource};

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        id: i32,
        name: String,
    }

    crate::impl_sheet_record!(Person { id: i32, name: String });

    fn sheet(rows: Vec<Vec<&str>>) -> SheetReader<MemorySource> {
        SheetReader::new(MemorySource::from_rows("people", rows), SheetOptions::default())
    }

    #[test]
    fn unregistered_types_are_auto_mapped_on_first_read() {
        let mut importer = Importer::new();
        let mut people = sheet(vec![vec!["Id", "Name"], vec!["1", "Alice"]]);
        let person: Option<Person> = importer.read_row(&mut people).unwrap();
        assert_eq!(
            person,
            Some(Person {
                id: 1,
                name: "Alice".to_string()
            })
        );
        assert_eq!(importer.registered(), vec!["Person"]);
        assert!(importer.read_row::<Person, _>(&mut people).unwrap().is_none());
    }

    #[test]
    fn configuration_is_rejected_after_the_first_read() {
        let mut importer = Importer::new();
        let mut people = sheet(vec![vec!["Id", "Name"]]);
        importer.read_all::<Person, _>(&mut people).unwrap();
        assert!(importer.is_frozen());
        let class_map = ClassMap::<Person>::new().unwrap();
        assert!(matches!(
            importer.register(class_map),
            Err(ConfigError::Frozen { .. })
        ));
        assert!(importer.auto_mapper_mut().is_err());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut importer = Importer::new();
        importer.register(ClassMap::<Person>::new().unwrap()).unwrap();
        assert_eq!(
            importer.register(ClassMap::<Person>::new().unwrap()),
            Err(ConfigError::DuplicateClassMap {
                type_name: "Person".to_string()
            })
        );
    }

    #[test]
    fn try_read_row_keeps_unmapped_fields() {
        let mut class_map = ClassMap::<Person>::new().unwrap();
        class_map.ignore("name").unwrap();
        let mut importer = Importer::new();
        importer.register(class_map).unwrap();
        let mut people = sheet(vec![vec!["Id", "Name"], vec!["4", "ignored"]]);
        let mut person = Person {
            id: 0,
            name: "kept".to_string(),
        };
        assert!(importer.try_read_row(&mut people, &mut person).unwrap());
        assert_eq!(person.id, 4);
        assert_eq!(person.name, "kept");
        assert!(!importer.try_read_row(&mut people, &mut person).unwrap());
    }

    #[test]
    fn read_rows_starts_at_the_requested_data_row() {
        let mut importer = Importer::new();
        let mut people = sheet(vec![
            vec!["Id", "Name"],
            vec!["1", "a"],
            vec!["2", "b"],
            vec!["3", "c"],
        ]);
        let rows: Vec<Person> = importer.read_rows(&mut people, 1, 5).unwrap();
        assert_eq!(rows.iter().map(|p| p.id).collect::<Vec<_>>(), vec![2, 3]);
    }
}
