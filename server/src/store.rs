//! To-do lists and the operations that mutate them.
//!
//! A [`TodoListStore`] is the per-session state: an ordered sequence of
//! [`TodoList`]s, each holding an ordered sequence of [`Todo`]s. Lists are
//! addressed by their position in the store, todos by an id that is unique
//! within their list and never reused.
//!
//! # Invariants
//!
//! - List names are trimmed, 1 to 100 characters, and unique (exact,
//!   case-sensitive match) within a store.
//! - Todo names are trimmed and 1 to 100 characters.
//! - A list is complete iff it holds at least one todo and every todo is
//!   completed. Completion is always derived, never stored.
//!
//! # Example
//!
//! ```rust
//! use todolists_server::store::TodoListStore;
//!
//! let mut store = TodoListStore::new();
//! let list = store.create_list("Groceries").unwrap();
//! let milk = store.add_todo(list, "Milk").unwrap();
//! store.set_todo_completed(list, milk, true).unwrap();
//!
//! assert!(store.list(list).unwrap().is_complete());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{NotFoundError, StoreError, ValidationError};

/// Maximum length of a list or todo name, in characters.
pub const MAX_NAME_LENGTH: usize = 100;

/// Position of a list within its store.
pub type ListRef = usize;

/// Identifier of a todo within its list.
pub type TodoId = u64;

/// A single actionable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub name: String,
    pub completed: bool,
}

/// A named, ordered collection of todos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoList {
    pub name: String,
    pub todos: Vec<Todo>,
    /// Id handed to the next todo. Only ever grows.
    next_todo_id: TodoId,
}

impl TodoList {
    fn new(name: String) -> Self {
        Self {
            name,
            todos: Vec::new(),
            next_todo_id: 1,
        }
    }

    /// Returns true if the list has at least one todo and all are completed.
    pub fn is_complete(&self) -> bool {
        is_list_complete(&self.todos)
    }

    /// Total number of todos in the list.
    pub fn todos_count(&self) -> usize {
        self.todos.len()
    }

    /// Number of todos not yet completed.
    pub fn todos_remaining_count(&self) -> usize {
        self.todos.iter().filter(|todo| !todo.completed).count()
    }

    /// Looks up a todo by id.
    pub fn todo(&self, id: TodoId) -> Option<&Todo> {
        self.todos.iter().find(|todo| todo.id == id)
    }

    fn todo_mut(&mut self, id: TodoId) -> Option<&mut Todo> {
        self.todos.iter_mut().find(|todo| todo.id == id)
    }
}

/// The collection of lists belonging to one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoListStore {
    lists: Vec<TodoList>,
}

impl TodoListStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All lists in creation order.
    pub fn lists(&self) -> &[TodoList] {
        &self.lists
    }

    /// Looks up a list by position.
    pub fn list(&self, list: ListRef) -> Option<&TodoList> {
        self.lists.get(list)
    }

    /// Number of lists.
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    /// Returns true if the store holds no lists.
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Creates a new empty list and returns its position.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidListNameLength`] if the trimmed name is
    ///   empty or longer than [`MAX_NAME_LENGTH`] characters
    /// - [`ValidationError::DuplicateName`] if another list already has the
    ///   trimmed name
    pub fn create_list(&mut self, name: &str) -> Result<ListRef, ValidationError> {
        let name = self.validate_list_name(name, None)?;
        self.lists.push(TodoList::new(name));
        Ok(self.lists.len() - 1)
    }

    /// Renames a list.
    ///
    /// The list being renamed is excluded from the duplicate check, so
    /// submitting its current name again succeeds.
    pub fn rename_list(&mut self, list: ListRef, new_name: &str) -> Result<(), StoreError> {
        if list >= self.lists.len() {
            return Err(NotFoundError::List { index: list }.into());
        }
        let name = self.validate_list_name(new_name, Some(list))?;
        self.lists[list].name = name;
        Ok(())
    }

    /// Removes a list, shifting the positions of every later list down by one.
    pub fn delete_list(&mut self, list: ListRef) -> Result<TodoList, NotFoundError> {
        if list >= self.lists.len() {
            return Err(NotFoundError::List { index: list });
        }
        Ok(self.lists.remove(list))
    }

    /// Appends a todo to a list and returns its id.
    ///
    /// Ids start at 1 and increase by one per added todo. Deleting a todo
    /// never frees its id.
    pub fn add_todo(&mut self, list: ListRef, text: &str) -> Result<TodoId, StoreError> {
        let list_ref = list;
        let list = self.list_mut(list_ref)?;
        let name = validated_name(text).ok_or(ValidationError::InvalidTodoLength)?;

        let id = list.next_todo_id;
        list.next_todo_id += 1;
        list.todos.push(Todo {
            id,
            name,
            completed: false,
        });
        Ok(id)
    }

    /// Removes a todo by id. A missing id is not an error.
    pub fn delete_todo(&mut self, list: ListRef, todo_id: TodoId) -> Result<(), NotFoundError> {
        let list = self.list_mut(list)?;
        list.todos.retain(|todo| todo.id != todo_id);
        Ok(())
    }

    /// Marks a single todo as completed or not.
    pub fn set_todo_completed(
        &mut self,
        list: ListRef,
        todo_id: TodoId,
        completed: bool,
    ) -> Result<(), NotFoundError> {
        let list_index = list;
        let todo = self
            .list_mut(list_index)?
            .todo_mut(todo_id)
            .ok_or(NotFoundError::Todo {
                list_index,
                todo_id,
            })?;
        todo.completed = completed;
        Ok(())
    }

    /// Marks every todo in a list as completed.
    pub fn complete_all(&mut self, list: ListRef) -> Result<(), NotFoundError> {
        for todo in &mut self.list_mut(list)?.todos {
            todo.completed = true;
        }
        Ok(())
    }

    /// Lists in display order, paired with their position in the store.
    pub fn sorted_lists(&self) -> Vec<(&TodoList, ListRef)> {
        sorted_lists(&self.lists)
    }

    fn list_mut(&mut self, list: ListRef) -> Result<&mut TodoList, NotFoundError> {
        self.lists
            .get_mut(list)
            .ok_or(NotFoundError::List { index: list })
    }

    fn validate_list_name(
        &self,
        name: &str,
        renaming: Option<ListRef>,
    ) -> Result<String, ValidationError> {
        let name = validated_name(name).ok_or(ValidationError::InvalidListNameLength)?;
        let taken = self
            .lists
            .iter()
            .enumerate()
            .any(|(index, list)| Some(index) != renaming && list.name == name);
        if taken {
            return Err(ValidationError::DuplicateName);
        }
        Ok(name)
    }
}

/// Trims `raw` and returns it if its length is within bounds.
fn validated_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    (1..=MAX_NAME_LENGTH)
        .contains(&len)
        .then(|| trimmed.to_string())
}

/// Returns true if `todos` is non-empty and every todo is completed.
pub fn is_list_complete(todos: &[Todo]) -> bool {
    !todos.is_empty() && todos.iter().all(|todo| todo.completed)
}

/// Orders lists with incomplete ones first, preserving relative order within
/// each group. Each list is paired with its original position.
pub fn sorted_lists(lists: &[TodoList]) -> Vec<(&TodoList, ListRef)> {
    partition_by_completion(lists, TodoList::is_complete)
}

/// Orders todos with incomplete ones first, preserving relative order within
/// each group. Each todo is paired with its original position.
pub fn sorted_todos(todos: &[Todo]) -> Vec<(&Todo, usize)> {
    partition_by_completion(todos, |todo| todo.completed)
}

fn partition_by_completion<T>(items: &[T], is_complete: impl Fn(&T) -> bool) -> Vec<(&T, usize)> {
    let (complete, mut ordered): (Vec<_>, Vec<_>) = items
        .iter()
        .enumerate()
        .map(|(index, item)| (item, index))
        .partition(|(item, _)| is_complete(*item));
    ordered.extend(complete);
    ordered
}
