//! HTML rendering for the four pages of the application.
//!
//! Every page is wrapped in a shared layout that shows pending flash
//! messages. User-supplied text is always escaped with [`escape`].

use crate::flash::Flash;
use crate::store::{sorted_todos, ListRef, TodoList, TodoListStore};

/// A page and the data it needs.
#[derive(Debug, Clone, Copy)]
pub enum View<'a> {
    /// Index of all lists, incomplete lists first.
    Lists { store: &'a TodoListStore },

    /// Form for creating a list. `list_name` pre-fills the input.
    NewList { list_name: &'a str },

    /// A single list with its todos and the add-todo form.
    List {
        list: &'a TodoList,
        list_id: ListRef,
        todo_input: &'a str,
    },

    /// Form for renaming or deleting a list.
    EditList {
        list: &'a TodoList,
        list_id: ListRef,
        list_name: &'a str,
    },
}

impl View<'_> {
    fn title(&self) -> String {
        match self {
            Self::Lists { .. } => "Todo Lists".to_string(),
            Self::NewList { .. } => "New List".to_string(),
            Self::List { list, .. } => list.name.clone(),
            Self::EditList { list, .. } => format!("Editing '{}'", list.name),
        }
    }
}

/// Renders `view` inside the layout, displaying `flash`.
pub fn render(view: View<'_>, flash: &Flash) -> String {
    let body = match view {
        View::Lists { store } => lists_page(store),
        View::NewList { list_name } => new_list_page(list_name),
        View::List {
            list,
            list_id,
            todo_input,
        } => list_page(list, list_id, todo_input),
        View::EditList {
            list,
            list_id,
            list_name,
        } => edit_list_page(list, list_id, list_name),
    };
    layout(&view.title(), flash, &body)
}

fn layout(title: &str, flash: &Flash, body: &str) -> String {
    let mut messages = String::new();
    if let Some(error) = &flash.error {
        messages.push_str(&format!(
            "<div class=\"flash error\"><p>{}</p></div>\n",
            escape(error)
        ));
    }
    if let Some(success) = &flash.success {
        messages.push_str(&format!(
            "<div class=\"flash success\"><p>{}</p></div>\n",
            escape(success)
        ));
    }

    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>{title}</title>\n\
         </head>\n\
         <body>\n\
         <header><h1><a href=\"/lists\">Todo Tracker</a></h1></header>\n\
         <main>\n\
         {messages}{body}\
         </main>\n\
         </body>\n\
         </html>\n",
        title = escape(title),
    )
}

fn lists_page(store: &TodoListStore) -> String {
    let mut items = String::new();
    for (list, index) in store.sorted_lists() {
        let class = if list.is_complete() { " class=\"complete\"" } else { "" };
        items.push_str(&format!(
            "<li{class}><a href=\"/lists/{index}\"><h2>{name}</h2><p>{remaining}/{total}</p></a></li>\n",
            name = escape(&list.name),
            remaining = list.todos_remaining_count(),
            total = list.todos_count(),
        ));
    }

    format!(
        "<ul id=\"lists\">\n{items}</ul>\n\
         <a class=\"add\" href=\"/lists/new\">New List</a>\n"
    )
}

fn new_list_page(list_name: &str) -> String {
    format!(
        "<form action=\"/lists\" method=\"post\">\n\
         <dl>\n\
         <dt><label for=\"list_name\">Enter the name for your new list:</label></dt>\n\
         <dd><input name=\"list_name\" id=\"list_name\" placeholder=\"List Name\" type=\"text\" value=\"{value}\"></dd>\n\
         </dl>\n\
         <fieldset class=\"actions\">\n\
         <input type=\"submit\" value=\"Save\">\n\
         <a href=\"/lists\">Cancel</a>\n\
         </fieldset>\n\
         </form>\n",
        value = escape(list_name),
    )
}

fn list_page(list: &TodoList, list_id: ListRef, todo_input: &str) -> String {
    let section_class = if list.is_complete() { " class=\"complete\"" } else { "" };

    let mut todos = String::new();
    for (todo, _) in sorted_todos(&list.todos) {
        let class = if todo.completed { " class=\"complete\"" } else { "" };
        todos.push_str(&format!(
            "<li{class}>\n\
             <form action=\"/lists/{list_id}/todos/{id}\" method=\"post\" class=\"check\">\n\
             <input type=\"hidden\" name=\"completed\" value=\"{toggle}\">\n\
             <button type=\"submit\">Complete</button>\n\
             </form>\n\
             <h3>{name}</h3>\n\
             <form action=\"/lists/{list_id}/todos/{id}/delete\" method=\"post\" class=\"delete\">\n\
             <button type=\"submit\">Delete</button>\n\
             </form>\n\
             </li>\n",
            id = todo.id,
            toggle = !todo.completed,
            name = escape(&todo.name),
        ));
    }

    format!(
        "<section id=\"todos\"{section_class}>\n\
         <header>\n\
         <h2>{name}</h2>\n\
         <ul>\n\
         <li><form action=\"/lists/{list_id}/complete_all\" method=\"post\">\
         <button class=\"check\" type=\"submit\">Complete All</button></form></li>\n\
         <li><a class=\"edit\" href=\"/lists/{list_id}/edit\">Edit List</a></li>\n\
         </ul>\n\
         </header>\n\
         <ul>\n{todos}</ul>\n\
         </section>\n\
         <form action=\"/lists/{list_id}/todos\" method=\"post\">\n\
         <dl>\n\
         <dt><label for=\"todo\">Enter a new todo item:</label></dt>\n\
         <dd><input name=\"todo\" id=\"todo\" placeholder=\"Something to do\" type=\"text\" value=\"{value}\"></dd>\n\
         </dl>\n\
         <fieldset class=\"actions\"><input type=\"submit\" value=\"Add\"></fieldset>\n\
         </form>\n\
         <a href=\"/lists\">All Lists</a>\n",
        name = escape(&list.name),
        value = escape(todo_input),
    )
}

fn edit_list_page(list: &TodoList, list_id: ListRef, list_name: &str) -> String {
    format!(
        "<section id=\"todos\">\n\
         <header><h2>Editing '{name}'</h2></header>\n\
         <form action=\"/lists/{list_id}/delete\" method=\"post\" class=\"delete\">\n\
         <button type=\"submit\">Delete List</button>\n\
         </form>\n\
         </section>\n\
         <form action=\"/lists/{list_id}\" method=\"post\">\n\
         <dl>\n\
         <dt><label for=\"list_name\">Enter the new name for the list:</label></dt>\n\
         <dd><input name=\"list_name\" id=\"list_name\" placeholder=\"List Name\" type=\"text\" value=\"{value}\"></dd>\n\
         </dl>\n\
         <fieldset class=\"actions\">\n\
         <input type=\"submit\" value=\"Save\">\n\
         <a href=\"/lists/{list_id}\">Cancel</a>\n\
         </fieldset>\n\
         </form>\n",
        name = escape(&list.name),
        value = escape(list_name),
    )
}

/// Escapes text for inclusion in HTML element content or quoted attributes.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_lists() -> TodoListStore {
        let mut store = TodoListStore::new();
        let done = store.create_list("Done list").unwrap();
        let id = store.add_todo(done, "finished").unwrap();
        store.set_todo_completed(done, id, true).unwrap();
        let open = store.create_list("Open list").unwrap();
        store.add_todo(open, "pending").unwrap();
        store.add_todo(open, "also pending").unwrap();
        store
    }

    #[test]
    fn escape_replaces_markup_characters() {
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn layout_shows_flash_messages() {
        let flash = Flash {
            error: Some("Oops <b>".to_string()),
            success: Some("Yay".to_string()),
        };

        let html = render(View::NewList { list_name: "" }, &flash);

        assert!(html.contains("<div class=\"flash error\"><p>Oops &lt;b&gt;</p></div>"));
        assert!(html.contains("<div class=\"flash success\"><p>Yay</p></div>"));
    }

    #[test]
    fn lists_page_orders_incomplete_first_with_original_links() {
        let store = store_with_lists();

        let html = render(View::Lists { store: &store }, &Flash::default());

        let open = html.find("Open list").unwrap();
        let done = html.find("Done list").unwrap();
        assert!(open < done);
        assert!(html.contains("<a href=\"/lists/1\"><h2>Open list</h2><p>2/2</p></a>"));
        assert!(html.contains(
            "<li class=\"complete\"><a href=\"/lists/0\"><h2>Done list</h2><p>0/1</p></a></li>"
        ));
    }

    #[test]
    fn new_list_page_keeps_submitted_value() {
        let html = render(View::NewList { list_name: "My \"list\"" }, &Flash::default());

        assert!(html.contains("value=\"My &quot;list&quot;\""));
        assert!(html.contains("action=\"/lists\""));
    }

    #[test]
    fn list_page_renders_todos_with_toggle_values() {
        let mut store = TodoListStore::new();
        let list = store.create_list("Chores").unwrap();
        let dishes = store.add_todo(list, "Dishes").unwrap();
        store.add_todo(list, "Laundry").unwrap();
        store.set_todo_completed(list, dishes, true).unwrap();

        let html = render(
            View::List {
                list: store.list(list).unwrap(),
                list_id: list,
                todo_input: "",
            },
            &Flash::default(),
        );

        assert!(html.contains("<title>Chores</title>"));
        assert!(html.find("Laundry").unwrap() < html.find("Dishes").unwrap());
        assert!(html.contains("action=\"/lists/0/todos/1\""));
        assert!(html.contains("action=\"/lists/0/todos/2/delete\""));
        assert!(html.contains("action=\"/lists/0/complete_all\""));
        assert!(html.contains("name=\"completed\" value=\"false\""));
        assert!(html.contains("name=\"completed\" value=\"true\""));
    }

    #[test]
    fn edit_list_page_prefills_name() {
        let mut store = TodoListStore::new();
        let list = store.create_list("Trips").unwrap();

        let html = render(
            View::EditList {
                list: store.list(list).unwrap(),
                list_id: list,
                list_name: "Vacations",
            },
            &Flash::default(),
        );

        assert!(html.contains("Editing &#39;Trips&#39;"));
        assert!(html.contains("value=\"Vacations\""));
        assert!(html.contains("action=\"/lists/0/delete\""));
    }
}
